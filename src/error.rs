use thiserror::Error;

pub type ConvoResult<T> = std::result::Result<T, ConvoError>;

#[derive(Debug, Error)]
pub enum ConvoError {
    #[error("sender must be one of Horse, Claw (got `{0}`)")]
    InvalidSender(String),
    #[error("message content must not be empty")]
    EmptyContent,
    #[error("invalid timestamp `{value}`: {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("message order must not be negative (got {0})")]
    NegativeOrder(i64),
    #[error("vector index failure: {0}")]
    Index(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConvoError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSender(_) => "E001_INVALID_SENDER",
            Self::EmptyContent => "E002_EMPTY_CONTENT",
            Self::InvalidTimestamp { .. } => "E003_INVALID_TIMESTAMP",
            Self::Index(_) => "E004_INDEX_FAILURE",
            Self::Io(_) => "E005_IO",
            Self::Json(_) => "E006_JSON",
            Self::NegativeOrder(_) => "E007_NEGATIVE_ORDER",
        }
    }

    /// Validation errors are the caller's fault; everything else is the backend's.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidSender(_)
                | Self::EmptyContent
                | Self::InvalidTimestamp { .. }
                | Self::NegativeOrder(_)
        )
    }

    pub fn invalid_timestamp(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConvoError;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ConvoError::InvalidSender("Bob".into()).code(),
            "E001_INVALID_SENDER"
        );
        assert_eq!(ConvoError::Index("down".into()).code(), "E004_INDEX_FAILURE");
    }

    #[test]
    fn only_caller_errors_are_validation() {
        assert!(ConvoError::EmptyContent.is_validation());
        assert!(ConvoError::invalid_timestamp("x", "bad").is_validation());
        assert!(ConvoError::NegativeOrder(-1).is_validation());
        assert!(!ConvoError::Index("down".into()).is_validation());
    }
}
