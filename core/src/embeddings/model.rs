use crate::embeddings::embedding::{SentenceEmbedding, TokenEmbeddings};
use crate::error::ServiceError;
use async_trait::async_trait;

/// A handle to an external embedding service.
///
/// Implementations perform the cross-process call; the model itself lives on
/// the other side of the boundary.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed the whole of `text` into one vector.
    async fn sentence_embedding(&self, text: &str) -> Result<SentenceEmbedding, ServiceError>;

    /// Tokenize `text` and embed every content token.
    async fn token_embeddings(&self, text: &str) -> Result<TokenEmbeddings, ServiceError>;

    /// Release the service. Queries after shutdown fail.
    async fn shutdown(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
