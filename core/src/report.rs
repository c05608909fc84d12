use std::fmt::Display;

use crate::embeddings::embedding::{SentenceEmbedding, TokenEmbeddings};
use crate::error::ServiceError;

/// Number of leading embedding values shown in a report.
pub const PREVIEW_LEN: usize = 5;

/// Significant digits of a rendered preview value.
const PRECISION: usize = 6;

/// Shape summary of one sentence query and one token query.
///
/// Renders as:
/// ```text
/// Embedding dim: 768
/// First 5 values: 0.0412346 -0.221745 1e-05 0 3.5
/// Token count: 11
/// ```
///
/// Preview values are single precision, as the model produces them, and are
/// printed with six significant digits.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub dim: usize,
    pub preview: [f32; PREVIEW_LEN],
    pub token_count: usize,
}

impl Report {
    /// Builds a report, refusing results too small to summarize.
    ///
    /// # Errors
    /// `EmbeddingTooShort` if the embedding has fewer than [`PREVIEW_LEN`]
    /// values, `NoTokens` if the token result is empty.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(sentence: &SentenceEmbedding, tokens: &TokenEmbeddings) -> Result<Self, ServiceError> {
        let prefix = sentence
            .prefix(PREVIEW_LEN)
            .ok_or(ServiceError::EmbeddingTooShort {
                dim: sentence.dim(),
                min: PREVIEW_LEN,
            })?;
        let mut preview = [0.0f32; PREVIEW_LEN];
        for (slot, v) in preview.iter_mut().zip(prefix) {
            *slot = *v as f32;
        }
        if tokens.tokens.is_empty() {
            return Err(ServiceError::NoTokens);
        }
        Ok(Self {
            dim: sentence.dim(),
            preview,
            token_count: tokens.token_count(),
        })
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Embedding dim: {}", self.dim)?;
        write!(f, "First {PREVIEW_LEN} values: ")?;
        for v in &self.preview {
            write!(f, "{} ", general_format(*v))?;
        }
        writeln!(f)?;
        write!(f, "Token count: {}", self.token_count)
    }
}

/// `%g` rendering with [`PRECISION`] significant digits: fixed notation for
/// decimal exponents in `-4..PRECISION`, scientific otherwise, trailing zeros
/// dropped.
fn general_format(v: f32) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let scientific = format!("{v:.prec$e}", prec = PRECISION - 1);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    #[allow(clippy::cast_possible_wrap)]
    let precision = PRECISION as i32;
    if exponent < -4 || exponent >= precision {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_zeros(mantissa), exponent.unsigned_abs())
    } else {
        #[allow(clippy::cast_sign_loss)]
        let decimals = (precision - 1 - exponent) as usize;
        strip_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn strip_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
