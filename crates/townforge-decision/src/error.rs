//! Error types for the decision pipeline.

use townforge_services::ServiceError;

/// Errors from the decision pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// A prompt template failed to load or render.
    #[error("template error: {0}")]
    Template(String),

    /// The model response could not be parsed into an action.
    #[error("parse error: {0}")]
    Parse(String),

    /// The model gateway failed.
    #[error("gateway error: {source}")]
    Gateway {
        /// The underlying service failure.
        #[from]
        source: ServiceError,
    },
}
