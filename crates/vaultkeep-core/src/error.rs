//! Core error types.
//!
//! Everything in this crate that can fail surfaces a [`CoreError`].  The
//! variants are caller-misuse conditions: building a key with an invalid
//! index, or addressing a slot outside the record.

/// Unified error type for the vaultkeep domain model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Vault indices start at 1.
    #[error("invalid vault index {index}: vault numbers start at 1")]
    InvalidIndex { index: u32 },

    /// The owner identifier was empty or whitespace.
    #[error("invalid vault owner: {reason}")]
    InvalidOwner { reason: String },

    /// A slot accessor was called with an index outside the record.
    #[error("slot {slot} out of range (vault has {slot_count} slots)")]
    SlotOutOfRange { slot: usize, slot_count: usize },
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
