use serde::{Deserialize, Serialize};

/// Fixed-length vector summarizing a whole input string.
///
/// The dimension is decided by the service, not by this crate. Services may
/// answer with a bare array or with an object holding an `embedding` array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "SentenceEmbeddingRepr")]
pub struct SentenceEmbedding(pub Vec<f64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum SentenceEmbeddingRepr {
    Bare(Vec<f64>),
    Wrapped { embedding: Vec<f64> },
}

impl From<SentenceEmbeddingRepr> for SentenceEmbedding {
    fn from(value: SentenceEmbeddingRepr) -> Self {
        match value {
            SentenceEmbeddingRepr::Bare(v) | SentenceEmbeddingRepr::Wrapped { embedding: v } => {
                Self(v)
            }
        }
    }
}

impl SentenceEmbedding {
    #[must_use]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// The first `n` values, or `None` if the vector is shorter than `n`.
    #[must_use]
    pub fn prefix(&self, n: usize) -> Option<&[f64]> {
        self.0.get(..n)
    }
}

/// Result of a token embedding query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenEmbeddings {
    /// The text the service tokenized.
    #[serde(default)]
    pub sentence: String,
    /// Content tokens, without the `[CLS]`/`[SEP]` markers.
    pub tokens: Vec<TokenEmbedding>,
    /// Vector of the `[CLS]` position, when the service sends it.
    #[serde(default)]
    pub sentence_embedding: Vec<f64>,
}

impl TokenEmbeddings {
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Token strings in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.text.as_str())
    }
}

/// One content token and its vector.
///
/// Services that only list token strings send bare strings; those become a
/// token with an empty vector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TokenEmbeddingRepr")]
pub struct TokenEmbedding {
    /// Token text with sub-word markers removed.
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f64>,
    /// Index among content tokens.
    #[serde(default)]
    pub position: usize,
    /// Character offsets of the token in the input.
    #[serde(default)]
    pub char_start: usize,
    #[serde(default)]
    pub char_end: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenEmbeddingRepr {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        embedding: Vec<f64>,
        #[serde(default)]
        position: usize,
        #[serde(default)]
        char_start: usize,
        #[serde(default)]
        char_end: usize,
    },
}

impl From<TokenEmbeddingRepr> for TokenEmbedding {
    fn from(value: TokenEmbeddingRepr) -> Self {
        match value {
            TokenEmbeddingRepr::Text(text) => Self {
                text,
                ..Default::default()
            },
            TokenEmbeddingRepr::Full {
                text,
                embedding,
                position,
                char_start,
                char_end,
            } => Self {
                text,
                embedding,
                position,
                char_start,
                char_end,
            },
        }
    }
}
