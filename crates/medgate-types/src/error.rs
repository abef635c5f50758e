//! Error types shared across all medgate crates.

/// Errors that can occur across the medgate runtime.
///
/// Each variant corresponds to a different subsystem: row-level policy
/// engine, audit ledger, alert dispatch, configuration, or the evaluation
/// pipeline itself.
#[derive(Debug, thiserror::Error)]
pub enum MedgateError {
    #[error("row-level policy error: {0}")]
    PolicyError(String),

    #[error("audit ledger error: {0}")]
    LedgerError(String),

    #[error("alert dispatch error: {0}")]
    AlertError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("security evaluation error: {0}")]
    EvaluationError(String),
}
