// File: src/error.rs
//! Failure taxonomy of a single rescheduling evaluation.
//!
//! An ineligible record is not an error: it is reported as
//! [`Evaluation::Skip`](crate::controller::Evaluation::Skip).
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RescheduleError {
    /// The `repeat` value does not match the supported grammar.
    #[error("Unsupported repeat value: {0}")]
    UnsupportedExpression(String),

    /// The expression parsed but no acceptable next date was found.
    #[error("Could not find the next occurrence for repeat value: {0}")]
    UnresolvableOccurrence(String),

    /// The field store refused or failed the write.
    #[error("Failed to save rescheduled task: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl RescheduleError {
    /// True for the failures that are shown to the user instead of propagated.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedExpression(_) | Self::UnresolvableOccurrence(_)
        )
    }
}
