use super::sampler::SamplerError;

/// Caller-supplied parameters outside the accepted bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("length must be between {min} and {max}, got {got}")]
    Length { min: usize, max: usize, got: usize },

    #[error("quantity must be between {min} and {max}, got {got}")]
    Quantity { min: usize, max: usize, got: usize },

    #[error("word count must be between {min} and {max}, got {got}")]
    WordCount { min: usize, max: usize, got: usize },

    #[error("at least one keyword is required")]
    NoKeywords,

    #[error("at most {max} keywords are allowed, got {got}")]
    TooManyKeywords { max: usize, got: usize },

    #[error("keyword at index {index} is empty")]
    EmptyKeyword { index: usize },

    #[error("keyword at index {index} exceeds {max} characters")]
    KeywordTooLong { index: usize, max: usize },

    #[error("separator must be a printable character")]
    Separator,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

impl GeneratorError {
    pub fn is_validation(&self) -> bool {
        matches!(self, GeneratorError::Validation(_))
    }
}
