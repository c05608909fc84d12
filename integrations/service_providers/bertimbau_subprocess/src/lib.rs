//! Child-process adapter implementing `bertimbau::embeddings::model::EmbeddingService`.
//!
//! The service is started as a child process and spoken to over its stdio, one
//! JSON object per line:
//!
//! ```text
//! -> {"method": "get_sentence_embedding", "sentence": "...", "model": "..."}
//! <- {"result": [0.12, -0.5, ...]}
//! -> {"method": "get_token_embeddings", "sentence": "...", "model": "..."}
//! <- {"result": {"tokens": [...], ...}}
//! <- {"error": "model not found"}
//! ```
//!
//! The child's stderr is inherited so its diagnostics reach the terminal.

use async_trait::async_trait;
use bertimbau::embeddings::{
    embedding::{SentenceEmbedding, TokenEmbeddings},
    ensure_non_empty,
    model::EmbeddingService,
};
use bertimbau::error::ServiceError;
use bertimbau::providers::DEFAULT_MODEL;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};
use tracing::{debug, info, warn};

const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Configuration for the child process.
///
/// ```json
/// {
///     "command": "python3",
///     "args": ["services/serve_bertimbau.py"],
///     "model": "neuralmind/bert-base-portuguese-cased",
///     "working_dir": "/opt/bertimbau",
///     "shutdown_grace_secs": 5
/// }
/// ```
#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct Config {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    model: Option<String>,
    working_dir: Option<PathBuf>,
    shutdown_grace_secs: Option<u64>,
}

#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum Method {
    GetSentenceEmbedding,
    GetTokenEmbeddings,
}

#[derive(Serialize)]
struct Request<'a> {
    method: Method,
    sentence: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

struct Pipe {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Pipe {
    /// Writes one request line and reads one reply line.
    async fn exchange(&mut self, method: Method, line: &str) -> Result<String, ServiceError> {
        debug!(?method, "writing request to embedding service");
        self.stdin.write_all(line.as_bytes()).await.map_err(io_error)?;
        self.stdin.flush().await.map_err(io_error)?;

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply).await.map_err(io_error)? == 0 {
            return Err(ServiceError::Request(
                "service closed its output".to_string(),
            ));
        }
        Ok(reply)
    }
}

/// An embedding service owned by this process.
///
/// The child is killed when the handle is dropped; [`EmbeddingService::shutdown`]
/// closes its input and gives it `shutdown_grace_secs` to exit on its own first.
pub struct SubprocessEmbedding {
    model: String,
    grace: Duration,
    pipe: Mutex<Option<Pipe>>,
}

impl SubprocessEmbedding {
    /// Starts the service described by `json_config`.
    ///
    /// # Errors
    /// This function will error if:
    ///  - The provided JSON is malformed, lacks `command`, or contains unknown fields
    ///  - The command can't be started (`NotFound`)
    pub async fn spawn(json_config: &str) -> Result<Self, ServiceError> {
        let config: Config = serde_json::from_str(json_config)?;

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            ServiceError::NotFound(format!("failed to start `{}`: {e}", config.command))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ServiceError::Request("child stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServiceError::Request("child stdout not captured".to_string()))?;
        info!(command = %config.command, pid = ?child.id(), "started embedding service");

        Ok(Self {
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            grace: Duration::from_secs(
                config
                    .shutdown_grace_secs
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
            pipe: Mutex::new(Some(Pipe {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            })),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, text: &str) -> Result<T, ServiceError> {
        ensure_non_empty(text)?;
        let mut line = serde_json::to_string(&Request {
            method,
            sentence: text,
            model: &self.model,
        })
        .map_err(|e| ServiceError::Parse(e.to_string()))?;
        line.push('\n');

        let mut guard = self.pipe.lock().await;
        // The pipe stays out of the slot until a whole reply line is read. A
        // failed or cancelled exchange drops it, which kills the child, so no
        // later call can read a reply meant for an earlier request.
        let mut pipe = guard
            .take()
            .ok_or_else(|| ServiceError::Request("service is no longer running".to_string()))?;
        let reply = pipe.exchange(method, &line).await?;
        *guard = Some(pipe);
        drop(guard);

        let reply: Reply =
            serde_json::from_str(&reply).map_err(|e| ServiceError::Parse(e.to_string()))?;
        match reply {
            Reply {
                error: Some(message),
                ..
            } => Err(ServiceError::Provider(message)),
            Reply {
                result: Some(value),
                ..
            } => serde_json::from_value(value).map_err(|e| ServiceError::Parse(e.to_string())),
            Reply { .. } => Err(ServiceError::Parse(
                "reply carries neither `result` nor `error`".to_string(),
            )),
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn io_error(e: std::io::Error) -> ServiceError {
    ServiceError::Request(e.to_string())
}

#[async_trait]
impl EmbeddingService for SubprocessEmbedding {
    async fn sentence_embedding(&self, text: &str) -> Result<SentenceEmbedding, ServiceError> {
        self.call(Method::GetSentenceEmbedding, text).await
    }

    async fn token_embeddings(&self, text: &str) -> Result<TokenEmbeddings, ServiceError> {
        self.call(Method::GetTokenEmbeddings, text).await
    }

    async fn shutdown(&self) -> Result<(), ServiceError> {
        let Some(Pipe {
            mut child,
            stdin,
            stdout,
        }) = self.pipe.lock().await.take()
        else {
            return Ok(());
        };
        // closing stdin is the service's cue to exit
        drop(stdin);
        drop(stdout);

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(%status, "embedding service exited");
                Ok(())
            }
            Ok(Err(e)) => Err(io_error(e)),
            Err(_) => {
                warn!(grace = ?self.grace, "embedding service did not exit, killing it");
                child.kill().await.map_err(io_error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SENTENCE: &str = "A multa será de 10% em caso de atraso.";

    const RESPONDER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *get_token_embeddings*) echo '{"result": {"sentence": "A multa", "tokens": [{"text": "A", "position": 0}, {"text": "multa", "position": 1}]}}' ;;
    *get_sentence_embedding*) echo '{"result": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]}' ;;
    *) echo '{"error": "unknown method"}' ;;
  esac
done
"#;

    fn sh(script: &str) -> String {
        json!({ "command": "sh", "args": ["-c", script] }).to_string()
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{
            "command": "python3",
            "args": ["serve.py", "--port", "0"],
            "working_dir": "/tmp",
            "shutdown_grace_secs": 1
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.command, "python3");
        assert_eq!(config.args, vec!["serve.py", "--port", "0"]);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.shutdown_grace_secs, Some(1));
        assert!(config.model.is_none());
    }

    #[test]
    fn test_request_wire_format() {
        let line = serde_json::to_value(Request {
            method: Method::GetTokenEmbeddings,
            sentence: "teste",
            model: DEFAULT_MODEL,
        })
        .unwrap();
        assert_eq!(
            line,
            json!({
                "method": "get_token_embeddings",
                "sentence": "teste",
                "model": DEFAULT_MODEL,
            })
        );
    }

    #[tokio::test]
    async fn test_config_errors() {
        let missing_command = SubprocessEmbedding::spawn(r#"{"args": []}"#).await;
        assert!(matches!(missing_command, Err(ServiceError::Config(_))));

        let unknown_field = SubprocessEmbedding::spawn(r#"{"command": "sh", "env": {}}"#).await;
        assert!(matches!(unknown_field, Err(ServiceError::Config(_))));
    }

    #[tokio::test]
    async fn test_spawn_missing_command_is_not_found() {
        let result =
            SubprocessEmbedding::spawn(r#"{"command": "bertimbau-no-such-binary-3f9c"}"#).await;
        assert!(matches!(result, Err(ServiceError::NotFound(msg)) if msg.contains("bertimbau-no-such-binary-3f9c")));
    }

    #[tokio::test]
    async fn test_queries_over_pipe() {
        let service = SubprocessEmbedding::spawn(&sh(RESPONDER)).await.unwrap();

        let embedding = service.sentence_embedding(SENTENCE).await.unwrap();
        assert_eq!(embedding.dim(), 6);

        let tokens = service.token_embeddings(SENTENCE).await.unwrap();
        assert_eq!(tokens.texts().collect::<Vec<_>>(), vec!["A", "multa"]);

        // same pipe, same answers
        assert_eq!(service.sentence_embedding(SENTENCE).await.unwrap(), embedding);

        assert!(service.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_full_session() {
        let report = bertimbau::client::session(SubprocessEmbedding::spawn(&sh(RESPONDER)), SENTENCE)
            .await
            .unwrap();
        assert_eq!(report.dim, 6);
        assert_eq!(report.token_count, 2);
    }

    #[tokio::test]
    async fn test_error_reply_is_provider_error() {
        let script = r#"while IFS= read -r line; do echo '{"error": "No module named torch"}'; done"#;
        let service = SubprocessEmbedding::spawn(&sh(script)).await.unwrap();
        assert_eq!(
            service.sentence_embedding(SENTENCE).await,
            Err(ServiceError::Provider("No module named torch".to_string()))
        );
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_reply_is_parse_error() {
        let script = r#"while IFS= read -r line; do echo 'Traceback (most recent call last):'; done"#;
        let service = SubprocessEmbedding::spawn(&sh(script)).await.unwrap();
        let result = service.token_embeddings(SENTENCE).await;
        assert!(matches!(result, Err(ServiceError::Parse(_))));
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_exited_service_is_request_error() {
        let service = SubprocessEmbedding::spawn(&sh("exit 0")).await.unwrap();
        let result = service.sentence_embedding(SENTENCE).await;
        assert!(matches!(result, Err(ServiceError::Request(_))));
    }

    #[tokio::test]
    async fn test_queries_after_shutdown_fail() {
        let service = SubprocessEmbedding::spawn(&sh(RESPONDER)).await.unwrap();
        service.shutdown().await.unwrap();
        // a second shutdown is a no-op
        service.shutdown().await.unwrap();
        let result = service.token_embeddings(SENTENCE).await;
        assert_eq!(
            result,
            Err(ServiceError::Request("service is no longer running".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancelled_query_does_not_leak_its_reply() {
        let script = r#"while IFS= read -r line; do sleep 1; echo '{"result": [9, 9, 9, 9, 9]}'; done"#;
        let service = SubprocessEmbedding::spawn(&sh(script)).await.unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), service.sentence_embedding(SENTENCE))
                .await;
        assert!(cancelled.is_err());

        // the late reply to the cancelled request must not answer this one
        let result = service.token_embeddings(SENTENCE).await;
        assert_eq!(
            result,
            Err(ServiceError::Request("service is no longer running".to_string()))
        );
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_exchange_retires_the_service() {
        let service = SubprocessEmbedding::spawn(&sh("exit 0")).await.unwrap();
        assert!(matches!(
            service.sentence_embedding(SENTENCE).await,
            Err(ServiceError::Request(_))
        ));
        assert_eq!(
            service.sentence_embedding(SENTENCE).await,
            Err(ServiceError::Request("service is no longer running".to_string()))
        );
    }

    #[tokio::test]
    async fn test_error_reply_keeps_the_service() {
        let script = r#"while IFS= read -r line; do
  case "$line" in
    *get_token_embeddings*) echo '{"error": "tokenizer not loaded"}' ;;
    *) echo '{"result": [1, 2, 3, 4, 5]}' ;;
  esac
done"#;
        let service = SubprocessEmbedding::spawn(&sh(script)).await.unwrap();
        assert!(matches!(
            service.token_embeddings(SENTENCE).await,
            Err(ServiceError::Provider(_))
        ));
        assert_eq!(service.sentence_embedding(SENTENCE).await.unwrap().dim(), 5);
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_kills_unresponsive_service() {
        let config = json!({
            "command": "sh",
            "args": ["-c", "trap '' TERM; sleep 30"],
            "shutdown_grace_secs": 0,
        })
        .to_string();
        let service = SubprocessEmbedding::spawn(&config).await.unwrap();
        let started = std::time::Instant::now();
        assert!(service.shutdown().await.is_ok());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let service = SubprocessEmbedding::spawn(&sh(RESPONDER)).await.unwrap();
        assert_eq!(
            service.sentence_embedding("").await,
            Err(ServiceError::EmptyInput)
        );
        service.shutdown().await.unwrap();
    }
}
