use symbiosis_index::IndexError;
use thiserror::Error;

/// Errors raised when constructing or editing an organism's genome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrganismError {
    #[error("interaction value {0} must be between -1 and 1")]
    InteractionOutOfRange(f64),
    #[error("{name} {value} must be between 0 and 1")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
}

/// Errors that can occur when constructing or running a world.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Topology(#[from] IndexError),
    #[error(transparent)]
    Organism(#[from] OrganismError),
    /// Lysis offspring would cost nothing, so staging never terminates.
    #[error("lysis offspring cost is {0}; a non-positive cost never terminates")]
    DegenerateLysisCost(f64),
}

/// Reject values outside `[-1, 1]` (NaN included).
pub(crate) fn check_interaction(value: f64) -> Result<f64, OrganismError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(OrganismError::InteractionOutOfRange(value))
    }
}

/// Reject values outside `[0, 1]` (NaN included).
pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<f64, OrganismError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(OrganismError::ProbabilityOutOfRange { name, value })
    }
}
