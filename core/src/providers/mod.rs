use std::{fmt::Display, str::FromStr};

use crate::error::ServiceError;

pub mod http;

/// Model the service is asked for when the config doesn't name one.
pub const DEFAULT_MODEL: &str = "neuralmind/bert-base-portuguese-cased";

/// The adapters a service can be reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Service listening on an HTTP endpoint, see [`http::HttpEmbedding`].
    #[default]
    Http,
    /// Service run as a child process speaking JSON lines over stdio.
    Subprocess,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Http => "http",
                Self::Subprocess => "subprocess",
            }
        )
    }
}

impl FromStr for ProviderKind {
    type Err = ServiceError;

    fn from_str(provider: &str) -> Result<Self, Self::Err> {
        match provider.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "subprocess" | "process" => Ok(Self::Subprocess),
            unknown => Err(ServiceError::Config(format!(
                "Unknown embedding service provider: '{unknown}'. valid options are http, subprocess"
            ))),
        }
    }
}
