//! Formula composition arithmetic.
//!
//! Everything here is a pure function of a `Formula` and the chemicals its
//! lines point at, except `scale`, `add_line`, `edit_line` and `remove_line`,
//! which mutate the formula they are handed. Nothing is persisted; callers
//! commit the formula through a `Repository`.

use crate::{
    error::{ensure_finite, ensure_quantity, FfragranceError},
    repository::Repository,
};
use ffragrance_schemas::{
    chemical::Chemical,
    formula::{Diluent, Formula, FormulaLine},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Derived figures for one formula line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineMetrics {
    pub line_id: Uuid,
    pub chemical_id: Uuid,
    pub chemical_name: String,
    pub category_id: Option<Uuid>,
    pub original_amount: f64,
    pub dilution_percentage: f64,
    pub actual_mass: f64,
    pub final_concentration: f64,
    pub ifra_safe_limit: Option<f64>,
    pub is_over_limit: bool,
}

/// Bucket for the compositional breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryKey {
    Category(Uuid),
    Uncategorized,
}

impl From<Option<Uuid>> for CategoryKey {
    fn from(id: Option<Uuid>) -> Self {
        id.map_or(CategoryKey::Uncategorized, CategoryKey::Category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaSummary {
    pub total_line_weight: f64,
    pub diluent_weight: f64,
    pub total_formula_weight: f64,
    pub lines: Vec<LineMetrics>,
    pub over_limit_count: usize,
}

/// Share of `total_weight` taken by `actual_mass`, in percent; zero when the
/// total is not positive.
pub fn concentration(actual_mass: f64, total_weight: f64) -> f64 {
    if total_weight > 0.0 {
        actual_mass / total_weight * 100.0
    } else {
        0.0
    }
}

/// Strict comparison: sitting exactly on the limit is compliant.
pub fn exceeds_limit(final_concentration: f64, ifra_safe_limit: Option<f64>) -> bool {
    ifra_safe_limit.map_or(false, |limit| final_concentration > limit)
}

pub fn compute_line_metrics<R>(formula: &Formula, chemicals: &R) -> Vec<LineMetrics>
where
    R: Repository<Chemical> + ?Sized,
{
    let total_weight = formula.total_formula_weight();

    formula
        .lines
        .iter()
        .filter_map(|line| match line_chemical(line, chemicals) {
            Ok(chemical) => Some(line_metrics(line, chemical, total_weight)),
            Err(err) => {
                debug!(formula = %formula.name, "skipping line: {}", err);
                None
            }
        })
        .collect()
}

/// The chemical a line points at. Lines whose chemical was never set, or no
/// longer resolves, are `MissingChemicalReference`.
pub fn line_chemical<'a, R>(line: &FormulaLine, chemicals: &'a R) -> Result<&'a Chemical, FfragranceError>
where
    R: Repository<Chemical> + ?Sized,
{
    line.chemical_id
        .and_then(|id| chemicals.get(&id))
        .ok_or(FfragranceError::MissingChemicalReference(line.id))
}

fn line_metrics(line: &FormulaLine, chemical: &Chemical, total_weight: f64) -> LineMetrics {
    let actual_mass = line.actual_mass();
    let final_concentration = concentration(actual_mass, total_weight);

    LineMetrics {
        line_id: line.id,
        chemical_id: chemical.id,
        chemical_name: chemical.name.clone(),
        category_id: chemical.category_id,
        original_amount: line.amount_grams,
        dilution_percentage: line.dilution_percentage,
        actual_mass,
        final_concentration,
        ifra_safe_limit: chemical.ifra_safe_limit,
        is_over_limit: exceeds_limit(final_concentration, chemical.ifra_safe_limit),
    }
}

/// Sums final concentration per category identity.
pub fn aggregate_by_category(lines: &[LineMetrics]) -> BTreeMap<CategoryKey, f64> {
    let mut breakdown = BTreeMap::new();
    for line in lines {
        *breakdown.entry(CategoryKey::from(line.category_id)).or_insert(0.0) += line.final_concentration;
    }
    breakdown
}

pub fn summarize<R>(formula: &Formula, chemicals: &R) -> FormulaSummary
where
    R: Repository<Chemical> + ?Sized,
{
    let lines = compute_line_metrics(formula, chemicals);
    let over_limit_count = lines.iter().filter(|line| line.is_over_limit).count();

    FormulaSummary {
        total_line_weight: formula.total_line_weight(),
        diluent_weight: formula.diluent_weight,
        total_formula_weight: formula.total_formula_weight(),
        lines,
        over_limit_count,
    }
}

/// Checks a stored line's amount and dilution with the same rules `add_line`
/// applies to new input.
pub fn validate_line(line: &FormulaLine) -> Result<(), FfragranceError> {
    ensure_quantity("amount", line.amount_grams)?;
    ensure_quantity("dilution", line.dilution_percentage)?;
    Ok(())
}

/// Checks the diluent weight and every line of a whole formula.
pub fn validate_quantities(formula: &Formula) -> Result<(), FfragranceError> {
    ensure_quantity("diluent weight", formula.diluent_weight)?;
    formula.lines.iter().try_for_each(validate_line)
}

/// Multiplies every line amount and the diluent weight so the formula weighs
/// `target_weight`. Dilution percentages are left alone. Returns the factor.
pub fn scale(formula: &mut Formula, target_weight: f64) -> Result<f64, FfragranceError> {
    let target_weight = ensure_finite("target weight", target_weight)?;
    let current_weight = formula.total_formula_weight();

    if !(current_weight > 0.0) || target_weight < 0.0 {
        return Err(FfragranceError::InvalidScaleTarget {
            current: current_weight,
            target: target_weight,
        });
    }

    let factor = ensure_finite("scale factor", target_weight / current_weight)?;
    for line in &mut formula.lines {
        line.amount_grams *= factor;
    }
    formula.diluent_weight *= factor;

    debug!(formula = %formula.name, factor, "formula scaled");
    Ok(factor)
}

/// Dilution a new line starts from: the strength of the chemical's stock
/// solution, or neat.
pub fn default_dilution(chemical: &Chemical) -> f64 {
    chemical.dilution_percentage.unwrap_or(100.0)
}

pub fn add_line<'a>(
    formula: &'a mut Formula,
    chemical: &Chemical,
    amount_grams: f64,
    dilution_percentage: f64,
) -> Result<&'a FormulaLine, FfragranceError> {
    let amount_grams = ensure_quantity("amount", amount_grams)?;
    let dilution_percentage = ensure_quantity("dilution", dilution_percentage)?;

    formula
        .lines
        .push(FormulaLine::new(chemical.id, amount_grams, dilution_percentage));
    let index = formula.lines.len() - 1;
    Ok(&formula.lines[index])
}

/// Overwrites a line's amount, and its dilution when one is given. Returns
/// `false` when no line has `line_id`.
pub fn edit_line(
    formula: &mut Formula,
    line_id: Uuid,
    amount_grams: f64,
    dilution_percentage: Option<f64>,
) -> Result<bool, FfragranceError> {
    let amount_grams = ensure_quantity("amount", amount_grams)?;
    let dilution_percentage = dilution_percentage
        .map(|value| ensure_quantity("dilution", value))
        .transpose()?;

    let Some(line) = formula.line_mut(line_id) else {
        return Ok(false);
    };
    line.amount_grams = amount_grams;
    if let Some(dilution) = dilution_percentage {
        line.dilution_percentage = dilution;
    }
    Ok(true)
}

pub fn set_diluent(
    formula: &mut Formula,
    diluent: Option<Diluent>,
    weight_grams: f64,
) -> Result<(), FfragranceError> {
    formula.diluent_weight = ensure_quantity("diluent weight", weight_grams)?;
    formula.diluent = diluent;
    Ok(())
}

pub fn remove_line(formula: &mut Formula, line_id: Uuid) -> Option<FormulaLine> {
    let index = formula.lines.iter().position(|line| line.id == line_id)?;
    Some(formula.lines.remove(index))
}

/// Final concentration a line would reach if it were added now.
pub fn preview_concentration(formula: &Formula, amount_grams: f64, dilution_percentage: f64) -> f64 {
    let actual_mass = amount_grams * (dilution_percentage / 100.0);
    concentration(actual_mass, formula.total_formula_weight() + amount_grams)
}
