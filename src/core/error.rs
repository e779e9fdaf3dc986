//! Typed failures raised by the valuation and transfer engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Type alias for Result using the engine error.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// The transfer would drive the source quantity below zero.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Source and destination platform are the same: {platform_id}")]
    SamePlatform { platform_id: String },

    /// A percentage was requested against a zero whole. Callers guard against
    /// empty inputs, so reaching this is a programming error.
    #[error("Division by zero while computing a percentage")]
    DivisionByZero,

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The stored holding changed since it was read.
    #[error("Holding {id} was modified concurrently")]
    Conflict { id: String },

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Price provider failed: {0}")]
    Provider(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<fjall::Error> for EngineError {
    fn from(e: fjall::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}
