//! Unified error types and result handling for `FlowSplit`.

use thiserror::Error;

/// Crate-wide error type.
///
/// Benign "nothing to do" states (already allocated, no rules configured,
/// not an inflow) are deliberately *not* errors; they are reported through
/// [`crate::core::allocation::AllocationOutcome`] so callers can tell a
/// no-op apart from a failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong while loading or validating configuration
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Upstream feed error for connection '{connection_id}': {message}")]
    Feed {
        /// Connection the failing feed request belonged to
        connection_id: String,
        /// Message reported by the feed implementation
        message: String,
    },

    #[error("Connection not found: {id}")]
    ConnectionNotFound {
        /// The connection id that was requested
        id: String,
    },

    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// The ledger transaction id that was requested
        id: String,
    },

    #[error("Bucket not found: {id}")]
    BucketNotFound {
        /// The bucket id that was requested
        id: i64,
    },

    #[error("Allocation rule not found: {id}")]
    RuleNotFound {
        /// The rule id that was requested
        id: i64,
    },

    #[error("Invalid percentage: {percentage}")]
    InvalidPercentage {
        /// The offending percentage
        percentage: f64,
    },
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
