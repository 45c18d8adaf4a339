//! Error taxonomy for the simulation engine
//!
//! Only genuine contract violations surface as errors. Configuration
//! problems that can degrade gracefully (e.g. a non-positive creation rate)
//! are logged as warnings instead, and "nothing to do" cases such as
//! popping an empty rework stack return `None`, never an error.

use thiserror::Error;

/// Errors raised by the simulation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A caller passed a value outside the operation's contract
    /// (negative duration or tick delta, NaN, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was attempted from a state that cannot honor it
    /// (starting work on an empty queue, double-pushing a unit onto the
    /// rework stack, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),
}
