use thiserror::Error;

/// Failure taxonomy for a single message analysis.
///
/// Only `MalformedMessage` and `InputTooLarge` ever reach a caller; lookup
/// and persistence failures are absorbed by the modules that encounter them
/// and degrade to a missing signal.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid email format: {0}")]
    MalformedMessage(String),

    #[error("message exceeds maximum size of {limit} bytes")]
    InputTooLarge { limit: usize },

    #[error("reputation lookup failed: {0}")]
    ExternalLookupFailure(String),

    #[error("sender history store failed: {0}")]
    PersistenceFailure(String),
}
