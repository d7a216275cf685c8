use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// A ray ended up in a state the layer geometry cannot explain.
    /// Fatal to the ray being traced, never to the whole run.
    #[error("Geometry inconsistency: {reason}")]
    GeometryInconsistency { reason: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] json::Error),
}

impl TransportError {
    pub(crate) fn geometry(reason: impl Into<String>) -> Self {
        TransportError::GeometryInconsistency {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        TransportError::InvalidParameters(reason.into())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
