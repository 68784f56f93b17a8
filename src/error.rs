/// Error taxonomy for the retrieval pipeline.
///
/// `Transport`, `Generation`, `Extraction` and `IndexUnavailable` are caught at
/// the boundary where they occur and degraded to an empty or fallback result.
/// `Precondition` is a caller bug and is returned as-is.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("remote index transport failure: {0}")]
    Transport(String),

    #[error("generation failure: {0}")]
    Generation(String),

    #[error("failed to extract text from {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("no local index available for collection {0}")]
    IndexUnavailable(String),

    #[error("precondition violated: {0}")]
    Precondition(String),
}

impl RagError {
    /// Whether the pipeline is expected to swallow this error and degrade.
    #[must_use]
    pub fn is_degradable(&self) -> bool {
        !matches!(self, RagError::Precondition(_))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(e: reqwest::Error) -> Self {
        RagError::Transport(e.to_string())
    }
}
