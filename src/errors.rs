use thiserror::Error;

use crate::driver::DriverError;
use crate::wait::Attempt;

/// Failures surfaced by interactions and flows, each with an exit code
#[derive(Debug, Error)]
pub enum FlowError {
    /// Resolution exhausted every stage and candidate (exit code 2)
    #[error("No element found for '{target}' after {} locator attempt(s)", .attempts.len())]
    NotFound {
        target: String,
        attempts: Vec<Attempt>,
    },

    /// Element resolved but the action kept failing (exit code 3)
    #[error("{action} failed on '{target}' after {attempts} attempt(s): {reason}")]
    InteractionFailed {
        action: &'static str,
        target: String,
        attempts: u32,
        reason: String,
    },

    /// Fatal driver failure, never retried (exit code 4)
    #[error("WebDriver session failed: {0}")]
    Driver(#[from] DriverError),

    /// Session could not be created or configured (exit code 4)
    #[error("WebDriver session setup failed: {0}")]
    Session(String),

    /// Invalid or unreadable configuration (exit code 5)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FlowError::NotFound { .. } => 2,
            FlowError::InteractionFailed { .. } => 3,
            FlowError::Driver(_) | FlowError::Session(_) => 4,
            FlowError::Config(_) => 5,
        }
    }

    pub(crate) fn not_found(target: &str, attempts: Vec<Attempt>) -> Self {
        FlowError::NotFound {
            target: target.to_string(),
            attempts,
        }
    }
}

/// Exit code for any error reaching the command line
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FlowError>())
        .map(FlowError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
