//! Error types for request construction.

use thiserror::Error;

/// Errors raised while building or patching a create request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// More extra disks were declared than there are SCSI slots for them.
    #[error("too many extra disks: {count} declared, at most {max} supported")]
    TooManyDisks { count: usize, max: usize },

    /// A slot index outside the fixed slot table was addressed.
    #[error("disk slot {slot} out of range (highest slot is {max})")]
    SlotOutOfRange { slot: usize, max: usize },

    /// The image has no checksum and its URL has no file name to key the
    /// staged raw image by.
    #[error("cannot derive a raw image name from {url:?}")]
    UnnamedImage { url: String },

    /// An overflow policy name could not be parsed.
    #[error("unknown disk overflow policy: {0}")]
    UnknownOverflowPolicy(String),
}

impl OptionsError {
    /// Returns true if this error is a disk capacity violation.
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, OptionsError::TooManyDisks { .. })
    }
}
