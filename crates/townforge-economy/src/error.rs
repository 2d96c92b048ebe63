//! Error types for economy bookkeeping.

/// Errors from economy configuration and ledgers.
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    /// An environment variable failed to parse.
    #[error("config error: {message}")]
    Config {
        /// What went wrong.
        message: String,
    },

    /// An internal ledger lock was poisoned.
    #[error("ledger lock poisoned")]
    LedgerPoisoned,
}
