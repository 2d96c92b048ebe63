//! Error type for the engine core.

use townforge_decision::DecisionError;
use townforge_economy::EconomyError;
use townforge_services::ServiceError;

/// Errors raised inside the engine core.
///
/// Nothing of this type ever escapes an agent pipeline: the pipeline
/// reifies it into a failed `TickResult` and the tick continues.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A collaborator failed.
    #[error("service error: {source}")]
    Service {
        /// The underlying service failure.
        #[from]
        source: ServiceError,
    },

    /// Economy bookkeeping failed.
    #[error("economy error: {source}")]
    Economy {
        /// The underlying economy failure.
        #[from]
        source: EconomyError,
    },

    /// The decision pipeline failed.
    #[error("decision error: {source}")]
    Decision {
        /// The underlying decision failure.
        #[from]
        source: DecisionError,
    },
}
