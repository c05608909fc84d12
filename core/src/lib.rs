//! # bertimbau - client for out-of-process embedding services
//!
//! The embedding model (BERTimbau by default) runs in its own process. This
//! crate defines the two queries a client may issue against it, the adapters
//! that carry those queries across the process boundary, and the one-shot
//! client that reports the shape of the answers.
//!
//! ## Components
//!
//! - **Embeddings**: result types and the [`EmbeddingService`](embeddings::model::EmbeddingService) trait
//! - **Providers**: built-in adapters, currently HTTP; the child-process
//!   adapter lives in the `bertimbau_subprocess` crate
//! - **Client**: the query sequence and the scoped service session
//! - **Report**: rendering of the query results
//!
//! ## Example
//!
//! ```rust,no_run
//! use bertimbau::{client, providers::http::HttpEmbedding};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = r#"{"api_url": "http://127.0.0.1:8000"}"#;
//!     match client::session(HttpEmbedding::connect(Some(config)), "A multa será de 10% em caso de atraso.").await {
//!         Ok(report) => println!("{report}"),
//!         Err(e) => eprintln!("Python error: {e}"),
//!     }
//! }
//! ```

/// One-shot query sequence and scoped service sessions
pub mod client;

/// Embedding result types and the service trait
pub mod embeddings;

/// Error type for all service operations
pub mod error;

/// Builtin service adapters
pub mod providers;

/// Rendering of query results
pub mod report;
