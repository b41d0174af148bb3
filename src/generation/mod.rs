//! Answer generation: prompt construction and the streaming chat client.

pub mod client;
pub(crate) mod prompt;

use async_trait::async_trait;
use futures_core::Stream;
use reqwest::StatusCode;
use std::pin::Pin;
use thiserror::Error;

pub use client::OpenAiChatClient;
pub(crate) use prompt::compose_prompt;

/// Errors raised by the chat provider.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP layer failed before or while receiving the response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected completion response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A streamed event frame could not be parsed.
    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),
}

/// Lazy, finite, single-pass sequence of answer tokens.
///
/// Dropping the stream aborts the underlying provider request, which is how
/// caller disconnects propagate.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Interface implemented by chat backends.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Start a token-streamed completion for the supplied prompt.
    async fn stream_completion(&self, prompt: String) -> Result<TokenStream, GenerationError>;
}
