pub mod embedding;
pub mod model;

use crate::error::ServiceError;

/// Rejects empty input before any request is made.
///
/// # Errors
/// Returns [`ServiceError::EmptyInput`] if `text` is empty.
pub fn ensure_non_empty(text: &str) -> Result<(), ServiceError> {
    if text.is_empty() {
        Err(ServiceError::EmptyInput)
    } else {
        Ok(())
    }
}

/// Cosine similarity of two embeddings, `0.0` if either has zero norm.
///
/// # Errors
/// Returns [`ServiceError::DimensionMismatch`] if the vectors differ in length.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, ServiceError> {
    if a.len() != b.len() {
        return Err(ServiceError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}
