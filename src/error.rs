//! Error types for mv_reagg.
//!
//! All errors that can occur while deciding on and building the
//! re-aggregation fix are represented by [`MvFixError`]. Errors are
//! propagated via `Result<T, MvFixError>` and surfaced to the enclosing
//! planner, which turns them into a planning failure for the statement.
//!
//! # Error Classification
//!
//! - **Input**: malformed catalog or planner input (bad group-by JSON,
//!   unknown tables, aggregates that cannot be recombined). The statement
//!   cannot be planned as written.
//! - **Internal**: upstream plan construction produced a shape the fix
//!   relies on never seeing. Indicates a bug.
//!
//! "No fix needed" is not an error: it is `Ok(false)` from
//! [`MvFixContext::try_fix`](crate::fix::MvFixContext::try_fix).

use std::fmt;

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum MvFixError {
    // ── Input errors ─────────────────────────────────────────────────────
    /// The view's JSON-encoded group-by expression list could not be decoded.
    #[error("malformed group-by expressions for view {view}: {reason}")]
    MalformedGroupBy { view: String, reason: String },

    /// A view column carries an aggregate that has no re-aggregation form.
    #[error("unsupported aggregate on view column {0}")]
    UnsupportedAggregate(String),

    /// A table or view definition referenced by the catalog was not found.
    #[error("catalog object not found: {0}")]
    NotFound(String),

    /// A catalog snapshot could not be loaded.
    #[error("invalid catalog snapshot: {0}")]
    InvalidCatalog(String),

    /// The fix configuration document could not be loaded.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Internal errors ──────────────────────────────────────────────────
    /// An internal consistency violation. Indicates a bug upstream.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Result alias used throughout the crate.
pub type MvFixResult<T> = Result<T, MvFixError>;

/// Classification of error kind for the planner's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MvFixErrorKind {
    Input,
    Internal,
}

impl fmt::Display for MvFixErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MvFixErrorKind::Input => write!(f, "INPUT"),
            MvFixErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl MvFixError {
    /// Classify the error.
    pub fn kind(&self) -> MvFixErrorKind {
        match self {
            MvFixError::MalformedGroupBy { .. }
            | MvFixError::UnsupportedAggregate(_)
            | MvFixError::NotFound(_)
            | MvFixError::InvalidCatalog(_)
            | MvFixError::InvalidConfig(_) => MvFixErrorKind::Input,

            MvFixError::InternalError(_) => MvFixErrorKind::Internal,
        }
    }

    /// Whether this error points at a defect in plan construction rather
    /// than at the statement or catalog being planned.
    pub fn is_internal(&self) -> bool {
        self.kind() == MvFixErrorKind::Internal
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        MvFixError::InternalError(msg.into())
    }
}
