use thiserror::Error;

/// Error types that can occur while relaying a streamed agent response.
///
/// Every variant carries an owned message so the error can be cloned and
/// delivered to each branch of a tee.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The agent call failed before any chunk was produced
    #[error("Dispatch error: {0}")]
    Dispatch(String),
    /// Writing a flush to the client transport failed
    #[error("Transport error: {0}")]
    Transport(String),
    /// The chunk producer failed mid-stream
    #[error("Upstream stream error: {0}")]
    Upstream(String),
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Durable conversation storage failed
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
}

impl RelayError {
    /// Wraps an error raised by a chunk producer, keeping upstream errors as-is.
    pub fn upstream(err: RelayError) -> Self {
        match err {
            RelayError::Upstream(_) => err,
            other => RelayError::Upstream(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::RelayError;

    #[test]
    fn upstream_keeps_existing_upstream_errors() {
        let err = RelayError::upstream(RelayError::Upstream("boom".into()));
        assert_eq!(err, RelayError::Upstream("boom".into()));
    }

    #[test]
    fn upstream_wraps_other_errors() {
        let err = RelayError::upstream(RelayError::Generic("boom".into()));
        assert_eq!(
            err,
            RelayError::Upstream("Generic error: boom".to_string())
        );
    }
}
