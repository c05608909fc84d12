use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::embeddings::{
    embedding::{SentenceEmbedding, TokenEmbeddings},
    ensure_non_empty,
    model::EmbeddingService,
};
use crate::error::ServiceError;
use crate::providers::DEFAULT_MODEL;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8000";

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_url: Option<String>,
    model: Option<String>,
    api_key_var: Option<String>,
}

/// `EmbeddingService` for a model served over HTTP.
///
/// # Supported Configuration
///
/// - `api_url`(optional): base URL of the service, `http://127.0.0.1:8000` by default
/// - `model`(optional): model identifier forwarded with every query
/// - `api_key_var`(optional): environment variable holding a bearer token
///
/// ```json
/// {
///     "api_url": "http://127.0.0.1:8000",
///     "model": "neuralmind/bert-base-portuguese-cased"
/// }
/// ```
///
/// # Endpoints
///
/// - `GET /health` when connecting
/// - `POST /sentence_embedding` and `POST /token_embeddings` with
///   `{"sentence": ..., "model": ...}`
pub struct HttpEmbedding {
    api_url: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl HttpEmbedding {
    /// Creates a new `HttpEmbedding` from an optional JSON configuration string
    ///
    /// # Errors
    /// This function will error if:
    ///  - The provided JSON is malformed or contains unknown fields
    ///  - `api_key_var` names an environment variable that isn't set
    pub fn new(json_config: Option<&str>) -> Result<Self, ServiceError> {
        let config: ModelConfig = match json_config {
            Some(json) => serde_json::from_str(json)?,
            None => ModelConfig::default(),
        };
        let api_key = match config.api_key_var {
            Some(var) => Some(std::env::var(&var).map_err(|_| {
                ServiceError::Config(format!("Failed to fetch env var `{var}`"))
            })?),
            None => None,
        };
        let api_url = config
            .api_url
            .unwrap_or_else(|| DEFAULT_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            api_url,
            api_key,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: Client::new(),
        })
    }

    /// Creates the client and checks that the service answers its health probe.
    ///
    /// # Errors
    /// Config errors as in [`HttpEmbedding::new`], `RequestError` if the
    /// endpoint can't be reached, `NotFound` if the probe isn't answered with
    /// a success status.
    pub async fn connect(json_config: Option<&str>) -> Result<Self, ServiceError> {
        let service = Self::new(json_config)?;
        service.health().await?;
        info!(url = %service.api_url, model = %service.model, "connected to embedding service");
        Ok(service)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    async fn health(&self) -> Result<(), ServiceError> {
        let url = self.endpoint("health");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "{url} answered with HTTP status {}",
                response.status().as_u16()
            )))
        }
    }

    async fn query<T: DeserializeOwned>(&self, path: &str, text: &str) -> Result<T, ServiceError> {
        ensure_non_empty(text)?;
        let url = self.endpoint(path);
        debug!(%url, chars = text.chars().count(), "querying embedding service");
        let request_body = json!({
            "sentence": text,
            "model": self.model,
        });
        let mut request = self.client.post(&url).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| ServiceError::Parse(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let error_message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(ServiceError::Provider(format!(
                "HTTP Status {status}: {error_message}"
            )))
        }
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedding {
    async fn sentence_embedding(&self, text: &str) -> Result<SentenceEmbedding, ServiceError> {
        self.query("sentence_embedding", text).await
    }

    async fn token_embeddings(&self, text: &str) -> Result<TokenEmbeddings, ServiceError> {
        self.query("token_embeddings", text).await
    }
}
