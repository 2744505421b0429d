use crate::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised {kind} '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

/// Evaporation tier of a material, ordered from most to least volatile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PyramidNote {
    #[default]
    Top,
    TopMid,
    Mid,
    MidBase,
    Base,
}

impl PyramidNote {
    pub const ALL: [PyramidNote; 5] = [
        PyramidNote::Top,
        PyramidNote::TopMid,
        PyramidNote::Mid,
        PyramidNote::MidBase,
        PyramidNote::Base,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PyramidNote::Top => "top",
            PyramidNote::TopMid => "topmid",
            PyramidNote::Mid => "mid",
            PyramidNote::MidBase => "midbase",
            PyramidNote::Base => "base",
        }
    }
}

impl fmt::Display for PyramidNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PyramidNote {
    type Err = ParseLabelError;

    /// Case-insensitive; separators between the two halves of a blended tier
    /// (`top-mid`, `mid base`) are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        PyramidNote::ALL
            .into_iter()
            .find(|note| note.as_str() == folded)
            .ok_or_else(|| ParseLabelError {
                kind: "pyramid note",
                value: s.to_string(),
            })
    }
}

/// How the on-hand stock of a chemical is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityUnit {
    #[default]
    Grams,
    Milliliters,
}

impl QuantityUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityUnit::Grams => "grams",
            QuantityUnit::Milliliters => "milliliters",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            QuantityUnit::Grams => "g",
            QuantityUnit::Milliliters => "ml",
        }
    }
}

impl fmt::Display for QuantityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantityUnit {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "g" | "gram" | "grams" => Ok(QuantityUnit::Grams),
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                Ok(QuantityUnit::Milliliters)
            }
            _ => Err(ParseLabelError {
                kind: "unit",
                value: s.to_string(),
            }),
        }
    }
}

/// An aroma chemical held in the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chemical {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub cas_number: String,
    /// Maximum share of the finished formula, in percent.
    #[serde(default)]
    pub ifra_safe_limit: Option<f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub pyramid_note: PyramidNote,
    #[serde(default)]
    pub unit: QuantityUnit,
    #[serde(default)]
    pub quantity_grams: Option<f64>,
    #[serde(default)]
    pub quantity_ml: Option<f64>,
    /// Strength of the stock solution, in percent of pure material.
    #[serde(default)]
    pub dilution_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_image: Option<Vec<u8>>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

impl Chemical {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            cas_number: String::new(),
            ifra_safe_limit: None,
            notes: String::new(),
            pyramid_note: PyramidNote::default(),
            unit: QuantityUnit::default(),
            quantity_grams: None,
            quantity_ml: None,
            dilution_percentage: None,
            structure_image: None,
            category_id: None,
            tag_ids: Vec::new(),
        }
    }

    pub fn with_cas_number(mut self, cas_number: impl Into<String>) -> Self {
        self.cas_number = cas_number.into();
        self
    }

    pub fn with_ifra_safe_limit(mut self, limit: f64) -> Self {
        self.ifra_safe_limit = Some(limit);
        self
    }

    pub fn with_pyramid_note(mut self, note: PyramidNote) -> Self {
        self.pyramid_note = note;
        self
    }

    pub fn with_dilution_percentage(mut self, percentage: f64) -> Self {
        self.dilution_percentage = Some(percentage);
        self
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Links a tag. Returns `false` if it was already linked.
    pub fn add_tag(&mut self, tag_id: Uuid) -> bool {
        if self.tag_ids.contains(&tag_id) {
            return false;
        }
        self.tag_ids.push(tag_id);
        true
    }

    /// Unlinks a tag. Returns `false` if it was not linked.
    pub fn remove_tag(&mut self, tag_id: Uuid) -> bool {
        let before = self.tag_ids.len();
        self.tag_ids.retain(|id| *id != tag_id);
        self.tag_ids.len() != before
    }

    /// Stock on hand in the chemical's preferred unit.
    pub fn on_hand(&self) -> Option<f64> {
        match self.unit {
            QuantityUnit::Grams => self.quantity_grams,
            QuantityUnit::Milliliters => self.quantity_ml,
        }
    }
}

impl Record for Chemical {
    const KIND: &'static str = "chemical";

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_note_parsing() {
        assert_eq!("top".parse::<PyramidNote>().unwrap(), PyramidNote::Top);
        assert_eq!("Top-Mid".parse::<PyramidNote>().unwrap(), PyramidNote::TopMid);
        assert_eq!("mid base".parse::<PyramidNote>().unwrap(), PyramidNote::MidBase);
        assert!("heart".parse::<PyramidNote>().is_err());
    }

    #[test]
    fn test_pyramid_notes_are_ordered_top_to_base() {
        let mut notes = vec![PyramidNote::Base, PyramidNote::Top, PyramidNote::Mid];
        notes.sort();
        assert_eq!(notes, vec![PyramidNote::Top, PyramidNote::Mid, PyramidNote::Base]);
    }

    #[test]
    fn test_pyramid_note_serde_labels() {
        let json = serde_json::to_string(&PyramidNote::MidBase).unwrap();
        assert_eq!(json, "\"midbase\"");
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("g".parse::<QuantityUnit>().unwrap(), QuantityUnit::Grams);
        assert_eq!(" ML ".parse::<QuantityUnit>().unwrap(), QuantityUnit::Milliliters);
        assert!("oz".parse::<QuantityUnit>().is_err());
    }

    #[test]
    fn test_tags_are_not_duplicated() {
        let mut chemical = Chemical::new("Iso E Super");
        let tag = Uuid::new_v4();
        assert!(chemical.add_tag(tag));
        assert!(!chemical.add_tag(tag));
        assert_eq!(chemical.tag_ids.len(), 1);
        assert!(chemical.remove_tag(tag));
        assert!(!chemical.remove_tag(tag));
    }

    #[test]
    fn test_on_hand_follows_unit() {
        let mut chemical = Chemical::new("Hedione");
        chemical.quantity_grams = Some(50.0);
        chemical.quantity_ml = Some(12.0);
        assert_eq!(chemical.on_hand(), Some(50.0));
        chemical.unit = QuantityUnit::Milliliters;
        assert_eq!(chemical.on_hand(), Some(12.0));
    }
}
