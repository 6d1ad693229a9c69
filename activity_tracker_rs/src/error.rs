use thiserror::Error;

/// Activity tracker error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Could not acquire an initial fix: {0}")]
    InitialFixFailure(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Sensor failed: {0}")]
    SensorFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors raised by the device location/motion interface
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("{0} permission refused")]
    PermissionDenied(String),

    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    #[error("timed out waiting for a fix")]
    Timeout,
}

/// Errors raised by an activity store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record rejected: {0}")]
    Rejected(String),
}

impl From<StoreError> for TrackerError {
    fn from(error: StoreError) -> Self {
        TrackerError::StorageError(error.to_string())
    }
}

impl TrackerError {
    /// Map a failure from `start()` into the caller-facing taxonomy.
    ///
    /// Permission refusals stay distinguishable so the caller can prompt and
    /// retry; everything else means no initial fix was obtained.
    pub fn from_start_failure(error: SensorError) -> Self {
        match error {
            SensorError::PermissionDenied(what) => TrackerError::PermissionDenied(what),
            other => TrackerError::InitialFixFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_failure_mapping() {
        let denied = TrackerError::from_start_failure(SensorError::PermissionDenied(
            "location".to_string(),
        ));
        assert_eq!(denied, TrackerError::PermissionDenied("location".to_string()));

        let timeout = TrackerError::from_start_failure(SensorError::Timeout);
        assert!(matches!(timeout, TrackerError::InitialFixFailure(_)));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: TrackerError = StoreError::Rejected("empty user".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Storage error: record rejected: empty user"
        );
    }
}
