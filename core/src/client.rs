use std::future::Future;

use tracing::{debug, info, warn};

use crate::embeddings::model::EmbeddingService;
use crate::error::ServiceError;
use crate::report::Report;

/// Sentence query, then token query, then the report. No retries.
///
/// # Errors
/// The first `ServiceError` raised by either query, or by [`Report::new`].
pub async fn run<S: EmbeddingService + ?Sized>(service: &S, text: &str) -> Result<Report, ServiceError> {
    let sentence = service.sentence_embedding(text).await?;
    debug!(dim = sentence.dim(), "received sentence embedding");

    let tokens = service.token_embeddings(text).await?;
    debug!(tokens = tokens.token_count(), "received token embeddings");

    Report::new(&sentence, &tokens)
}

/// Acquires a service, runs both queries and shuts the service down again,
/// on the error path too.
///
/// A shutdown failure is only returned when the queries succeeded; otherwise
/// the query error wins and the shutdown failure is logged.
///
/// # Errors
/// Connection errors, query errors, or the shutdown error as described above.
pub async fn session<F, S>(connect: F, text: &str) -> Result<Report, ServiceError>
where
    F: Future<Output = Result<S, ServiceError>>,
    S: EmbeddingService,
{
    let service = connect.await?;
    let outcome = run(&service, text).await;

    match service.shutdown().await {
        Ok(()) => info!("embedding service released"),
        Err(e) if outcome.is_ok() => return Err(e),
        Err(e) => warn!("Failed to release embedding service: {e}"),
    }
    outcome
}
