use crate::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::chemical::ParseLabelError;

/// Carrier used to bring a concentrate down to its working strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diluent {
    #[serde(rename = "Perfumer's Alcohol")]
    PerfumersAlcohol,
    #[serde(rename = "DPG")]
    Dpg,
}

impl Diluent {
    pub fn label(&self) -> &'static str {
        match self {
            Diluent::PerfumersAlcohol => "Perfumer's Alcohol",
            Diluent::Dpg => "DPG",
        }
    }
}

impl fmt::Display for Diluent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Diluent {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perfumer's alcohol" | "perfumers alcohol" | "alcohol" | "ethanol" => {
                Ok(Diluent::PerfumersAlcohol)
            }
            "dpg" | "dipropylene glycol" => Ok(Diluent::Dpg),
            _ => Err(ParseLabelError {
                kind: "diluent",
                value: s.to_string(),
            }),
        }
    }
}

fn default_dilution() -> f64 {
    100.0
}

/// One weighed ingredient of a formula.
///
/// `amount_grams` is the mass of the material as weighed, which may itself be
/// a solution; `dilution_percentage` is the share of that mass which is pure
/// chemical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaLine {
    pub id: Uuid,
    #[serde(default)]
    pub chemical_id: Option<Uuid>,
    pub amount_grams: f64,
    #[serde(default = "default_dilution")]
    pub dilution_percentage: f64,
}

impl FormulaLine {
    pub fn new(chemical_id: Uuid, amount_grams: f64, dilution_percentage: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            chemical_id: Some(chemical_id),
            amount_grams,
            dilution_percentage,
        }
    }

    /// Mass of pure chemical in this line.
    pub fn actual_mass(&self) -> f64 {
        self.amount_grams * (self.dilution_percentage / 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub smell_description: Option<String>,
    #[serde(default)]
    pub diluent: Option<Diluent>,
    #[serde(default)]
    pub diluent_weight: f64,
    #[serde(default)]
    pub lines: Vec<FormulaLine>,
}

impl Formula {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            smell_description: None,
            diluent: None,
            diluent_weight: 0.0,
            lines: Vec::new(),
        }
    }

    pub fn with_diluent(mut self, diluent: Option<Diluent>, weight_grams: f64) -> Self {
        self.diluent = diluent;
        self.diluent_weight = weight_grams;
        self
    }

    /// Sum of the weighed line amounts, not corrected for dilution.
    pub fn total_line_weight(&self) -> f64 {
        self.lines.iter().map(|line| line.amount_grams).sum()
    }

    /// Lines plus diluent; the denominator of every final concentration.
    pub fn total_formula_weight(&self) -> f64 {
        self.total_line_weight() + self.diluent_weight
    }

    pub fn line(&self, line_id: Uuid) -> Option<&FormulaLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    pub fn line_mut(&mut self, line_id: Uuid) -> Option<&mut FormulaLine> {
        self.lines.iter_mut().find(|line| line.id == line_id)
    }

    /// Chemicals referenced by at least one line.
    pub fn chemical_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.lines.iter().filter_map(|line| line.chemical_id)
    }
}

impl Record for Formula {
    const KIND: &'static str = "formula";

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
