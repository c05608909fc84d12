use thiserror::Error;

/// Failure while acquiring or querying an embedding service.
///
/// Every variant is reported the same way at the top level; the variants only
/// refine the diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Invalid service configuration: {0}")]
    Config(String),
    #[error("Embedding service not found: {0}")]
    NotFound(String),
    #[error("RequestError: {0}")]
    Request(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("ParseError: {0}")]
    Parse(String),
    #[error("Input text is empty")]
    EmptyInput,
    #[error("Sentence embedding has {dim} values, expected at least {min}")]
    EmbeddingTooShort { dim: usize, min: usize },
    #[error("Token embeddings contain no tokens")]
    NoTokens,
    #[error("Embeddings differ in dimension: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}
