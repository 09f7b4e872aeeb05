//! Error types for the register model

use thiserror::Error;

/// Register model error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Block rejected before it reaches the planner
    #[error("Invalid block at {start} (length {length}): {reason}")]
    InvalidBlock {
        start: u16,
        length: u16,
        reason: String,
    },

    /// Address resolves outside the 10,000 slots of its bank
    #[error("Address {address} is out of range for {bank}")]
    AddressOutOfRange { address: u16, bank: &'static str },

    /// Bit values stored into a word bank or the reverse
    #[error("{bank} cannot hold {kind} values")]
    BankKind {
        bank: &'static str,
        kind: &'static str,
    },
}

impl ModelError {
    pub fn invalid_block(start: u16, length: u16, reason: impl Into<String>) -> Self {
        ModelError::InvalidBlock {
            start,
            length,
            reason: reason.into(),
        }
    }
}

/// Result type alias for the register model
pub type Result<T> = std::result::Result<T, ModelError>;
