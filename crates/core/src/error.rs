//! Error taxonomy shared across the workspace (spec §6.4, §7).
//!
//! One flat `thiserror`-derived enum, the same shape as the teacher's
//! `strata_core::error::Error`, but carrying the error *kinds* spec §6.4
//! enumerates rather than this system's own internal variants.

use crate::format_version::FormatVersionError;
use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RecordGraphError>;

/// All error kinds named in spec §6.4.
#[derive(Debug, Error)]
pub enum RecordGraphError {
    /// A second `save()` was attempted while one was already in flight.
    #[error("a save() is already in progress on this context")]
    ConcurrentSaveNotAllowed,

    /// No record model is registered for the given type name.
    #[error("no model registered for type {0:?}")]
    ModelNotFound(String),

    /// A transaction's approximate size crossed the hard limit.
    #[error("transaction too large: {current_size} bytes >= limit {limit} bytes ({hint})")]
    TransactionTooLarge { current_size: usize, limit: usize, hint: String },

    /// A packed index key exceeded the KV store's key size limit.
    #[error("index key too large: {actual} bytes >= limit {limit} bytes")]
    KeyTooLarge { actual: usize, limit: usize },

    /// The stored format version is older than this build supports.
    #[error("format version too old: {0}")]
    FormatVersionTooOld(FormatVersionError),
    /// The stored format version is newer than this build supports.
    #[error("format version too new: {0}")]
    FormatVersionTooNew(FormatVersionError),
    /// The stored format version's major component doesn't match.
    #[error("format major version mismatch: {0}")]
    FormatMajorMismatch(FormatVersionError),
    /// The online upgrade routine itself failed.
    #[error("format version upgrade failed: {0}")]
    FormatUpgradeFailed(String),

    /// The transaction runner exhausted its retry budget.
    #[error("exhausted retries after {attempts} attempts: {source}")]
    ExhaustedRetries { attempts: u32, source: Box<RecordGraphError> },

    /// A query referenced an index that has no configuration.
    #[error("index not configured: {0}")]
    IndexNotConfigured(String),
    /// A query referenced an index name that doesn't exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// A SPARQL/graph pattern was structurally invalid.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    /// Two merged solutions disagreed on a shared variable where the
    /// operation requires them to agree (e.g. a SELECT-list variable bound
    /// two different ways).
    #[error("variable conflict")]
    VariableConflict,
    /// A BGP had no triple patterns.
    #[error("no patterns given")]
    NoPatterns,
    /// A GROUP BY clause referenced a variable not produced by its
    /// pattern, or an aggregate over an invalid expression.
    #[error("invalid group by: {0}")]
    InvalidGroupBy(String),
    /// A SELECT query couldn't be converted to the requested shape (e.g.
    /// ASK-only conversion of a non-boolean query).
    #[error("cannot convert SELECT query: {0}")]
    CannotConvertSelectQuery(String),
    /// An expression used a built-in function or operator not supported
    /// by this evaluator.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),
    /// A literal's declared type didn't match the value it carries.
    #[error("incompatible literal type: {0}")]
    IncompatibleLiteralType(String),

    /// Wraps an underlying KV-collaborator error (see `recordgraph-durability`).
    #[error("storage error: {0}")]
    Storage(String),

    /// Tuple encoding/decoding failure.
    #[error("keyspace encoding error: {0}")]
    Keyspace(#[from] crate::keyspace::UnpackError),
}

impl RecordGraphError {
    /// Whether the transaction runner (§4.9) should retry this error.
    ///
    /// Recognizes the retryable classes named in spec §4.3: `timeout`,
    /// `conflict`, `too_old`/`transaction_too_old`, `future_version`,
    /// `not_committed`. The KV collaborator surfaces these as
    /// `RecordGraphError::Storage` with a matching tag; see
    /// `recordgraph-concurrency::throttle::is_retryable`, which is the
    /// canonical classifier this mirrors for non-storage errors too.
    pub fn is_retryable_kv_error(&self) -> bool {
        matches!(self, RecordGraphError::Storage(msg) if is_retryable_message(msg))
    }
}

/// Shared substring classifier used by both the error type and the
/// concurrency crate's throttler so the two can't drift apart.
pub fn is_retryable_message(msg: &str) -> bool {
    const RETRYABLE: &[&str] =
        &["timeout", "conflict", "too_old", "transaction_too_old", "future_version", "not_committed"];
    RETRYABLE.iter().any(|tag| msg.contains(tag))
}
