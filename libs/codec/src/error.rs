//! Codec-level errors for RWF container encoding and decoding.
//!
//! Every failure is a result code, never a panic: buffer exhaustion and
//! malformed wire data are ordinary, locally recoverable outcomes for the
//! caller (retry with a larger buffer, reject the offending message).
//! Contract violations by the calling code - mismatched init/complete
//! nesting, refcount underflow in the view engine - are asserted instead and
//! are deliberately not part of this taxonomy.

use thiserror::Error;

/// Errors reported by the container codec and set-definition databases.
///
/// `EndOfContainer` and `SetComplete` are not errors and therefore not listed
/// here: decode loops see end-of-container as `Ok(None)`, and entry encoders
/// report completion of a set-data phase through [`crate::EncodeOutcome`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Insufficient space in the destination buffer. Recoverable: re-encode
    /// the whole message into a larger buffer.
    #[error("buffer too small: need {needed} bytes, {remaining} remaining")]
    BufferTooSmall { needed: usize, remaining: usize },

    /// A value or length violates a wire-format constraint.
    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    /// Set data was requested but no matching set definition is resolvable
    /// from the local or global database.
    #[error("set definition {set_id} not provided")]
    SetDefNotProvided { set_id: u16 },

    /// Container nesting exceeded the iterator's level stack.
    #[error("nesting depth exceeds the maximum of {max_levels} encoding levels")]
    IteratorOverrun { max_levels: usize },

    /// An operation was invoked in a state the per-level state machine does
    /// not permit, e.g. a standard entry while set entries are still owed.
    #[error("unexpected call in state {state}")]
    UnexpectedCall { state: &'static str },

    /// Decode ran off the end of the input buffer.
    #[error("incomplete data: input exhausted at offset {at}")]
    IncompleteData { at: usize },
}

impl CodecError {
    /// Build an `InvalidData` error from any displayable reason.
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        Self::InvalidData {
            reason: reason.into(),
        }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
