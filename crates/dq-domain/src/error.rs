//! Error types for the domain model

/// Errors raised when parsing domain values from strings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Status string not found in any known vocabulary
    #[error("unknown status: '{0}'")]
    UnknownStatus(String),

    /// Priority string not recognised
    #[error("unknown priority: '{0}'")]
    UnknownPriority(String),

    /// Board filter mode not recognised
    #[error("unknown board filter: '{0}'")]
    UnknownBoardFilter(String),
}

/// Result type alias for domain parsing
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_display() {
        let err = DomainError::UnknownStatus("blocked".to_string());
        assert_eq!(err.to_string(), "unknown status: 'blocked'");
    }

    #[test]
    fn unknown_board_filter_display() {
        let err = DomainError::UnknownBoardFilter("team".to_string());
        assert!(err.to_string().contains("board filter"));
    }
}
