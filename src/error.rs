use thiserror::Error;

/// Error taxonomy for the simulation core (see spec §7).
///
/// `Validation` and `PilotUnable` are not fatal: they surface to the caller
/// as a `CommandResult` with no state mutated. `InvariantViolation` aborts
/// the tick that produced it; the session continues with the next tick.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("unable: {0}")]
    Validation(String),

    #[error("pilot unable: {0}")]
    PilotUnable(String),

    #[error("not found: {0}")]
    MissingEntity(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl SimError {
    pub fn is_pilot_unable(&self) -> bool {
        matches!(self, SimError::PilotUnable(_))
    }
}

pub type SimResult<T> = Result<T, SimError>;
