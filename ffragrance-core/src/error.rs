use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FfragranceError {
    #[error("Cannot scale a formula weighing {current} g to {target} g")]
    InvalidScaleTarget { current: f64, target: f64 },

    #[error("Formula line {0} has no chemical")]
    MissingChemicalReference(Uuid),

    #[error("{field} must be a finite number, got {value}")]
    NonFiniteInput { field: &'static str, value: f64 },

    #[error("{field} cannot be negative, got {value}")]
    NegativeQuantity { field: &'static str, value: f64 },

    #[error("Cannot delete {kind} '{name}': still used by {}", .dependents.join(", "))]
    DeleteBlockedByReference {
        kind: &'static str,
        name: String,
        dependents: Vec<String>,
    },

    #[error("No {kind} matches '{key}'")]
    NotFound { kind: &'static str, key: String },

    #[error("{referenced_by} refers to unknown {kind} {id}")]
    UnknownReference {
        kind: &'static str,
        id: Uuid,
        referenced_by: String,
    },

    #[error("Invalid colour: {0}")]
    InvalidColor(#[from] ffragrance_schemas::color::ParseColorError),

    #[error("Failed to process CSV section '{0}': {1}")]
    Csv(String, #[source] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<f64, FfragranceError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FfragranceError::NonFiniteInput { field, value })
    }
}

/// A weight or percentage: finite and not below zero.
pub(crate) fn ensure_quantity(field: &'static str, value: f64) -> Result<f64, FfragranceError> {
    let value = ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(FfragranceError::NegativeQuantity { field, value });
    }
    Ok(value)
}
