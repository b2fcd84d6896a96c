use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("`{input}` is not a valid date/time: {reason}")]
    InvalidTimestamp { input: String, reason: String },
}

impl DomainError {
    pub fn invalid_timestamp(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
