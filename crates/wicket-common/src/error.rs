//! The gate error taxonomy.

use thiserror::Error;

/// Errors produced by a verification gate.
///
/// Every failure path surfaces exactly one of these to the user and leaves
/// the gate in a well-defined, re-triggerable state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    /// Unknown challenge kind or bad provider configuration; fatal to the
    /// current cycle, cancel required to retry
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure calling the provider; retry is manual
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider confirmed the proof is wrong; the widget stays up
    #[error("Verification rejected: {0}")]
    Rejected(String),

    /// Empty/malformed proof or destination, blocked before any remote call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Trigger pressed while the resend cooldown is still running
    #[error("Cooldown active: {0}s remaining")]
    Cooldown(u32),

    /// An operation arrived in a state that cannot accept it
    #[error("Out of turn: {0}")]
    OutOfTurn(String),
}

impl GateError {
    /// Can the user recover by simply re-triggering the action?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Rejected(_) | Self::Validation(_) | Self::Cooldown(_)
        )
    }

    /// Does recovery require an explicit cancel first?
    pub fn needs_cancel(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
