//! Provides the error type that is used
//! throughout this crate.

use thiserror::Error;

/// The error type that is used throughout this crate.
///
/// Recoverable conditions (joint limits, collisions, ground contact) are not
/// errors; they are reported through the validity accessors instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArmatureError {
    /// A vector had the wrong length for the structure it was applied to,
    /// e.g. targets vs. effectors or a joint vector vs. the node count.
    #[error("shape mismatch: expected {expected} entries, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    /// A numerical routine produced NaN/Inf or failed to converge.
    #[error("numerical breakdown in {0}")]
    NumericalBreakdown(&'static str),
    // Structural tree errors
    #[error("node reference {0} is out of bound")]
    ReferenceOutOfBound(usize),
    #[error("no root node set")]
    RootNotSet,
    #[error("root node already set")]
    RootAlreadySet,
}
