//! Streaming chat-completion client for the OpenAI API.

use crate::config::get_config;
use crate::generation::{ChatClient, GenerationError, TokenStream};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Chat client backed by the OpenAI `/v1/chat/completions` endpoint with
/// server-sent-event streaming.
pub struct OpenAiChatClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

impl OpenAiChatClient {
    /// Construct a new client using configuration derived from the environment.
    ///
    /// Only a connect timeout is applied; a full request timeout would sever
    /// long-running generations mid-stream.
    pub fn new() -> Result<Self, GenerationError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("ragserve/0.1")
            .connect_timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.chat_model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Pop one complete newline-terminated line off the front of the buffer.
///
/// Returns `None` until the line's final byte has arrived; decoding happens
/// per complete line, never per network chunk, so a multi-byte codepoint
/// split across chunks is reassembled before it is interpreted.
fn next_line(buffer: &mut Vec<u8>) -> Option<String> {
    let newline = buffer.iter().position(|&byte| byte == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=newline).collect();
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// Extract the token carried by one SSE data frame, if any.
///
/// Frames without text content (role announcements, finish markers) are
/// skipped rather than treated as errors.
fn parse_token(data: &str) -> Result<Option<String>, GenerationError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|err| GenerationError::MalformedEvent(format!("{err}: {data}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn stream_completion(&self, prompt: String) -> Result<TokenStream, GenerationError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Starting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": 0,
                "stream": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Completion request failed");
            return Err(error);
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            // Network chunks can split an SSE frame anywhere, including
            // mid-codepoint; keep raw bytes and decode per complete line.
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                buffer.extend_from_slice(&chunk);

                while let Some(line) = next_line(&mut buffer) {
                    let Some(data) = line.trim().strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        done = true;
                        break;
                    }
                    if data.is_empty() {
                        continue;
                    }
                    if let Some(token) = parse_token(data)? {
                        yield token;
                    }
                }
                if done {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(server: &MockServer) -> OpenAiChatClient {
        OpenAiChatClient {
            client: Client::builder()
                .user_agent("ragserve-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "sk-test".into(),
            model: "gpt-3.5-turbo".into(),
        }
    }

    async fn collect_tokens(stream: TokenStream) -> Vec<String> {
        stream
            .map(|token| token.expect("token"))
            .collect::<Vec<_>>()
            .await
    }

    #[test]
    fn next_line_waits_for_the_full_line() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"data: partial");
        assert!(next_line(&mut buffer).is_none());

        buffer.extend_from_slice(b" frame\ndata: next");
        assert_eq!(
            next_line(&mut buffer).as_deref(),
            Some("data: partial frame\n")
        );
        assert!(next_line(&mut buffer).is_none());
    }

    #[test]
    fn next_line_reassembles_codepoints_split_across_chunks() {
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
        // Split inside the two-byte 'é' sequence, as TCP is free to do.
        let split = frame
            .iter()
            .position(|&byte| byte == 0xC3)
            .expect("multi-byte char present")
            + 1;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&frame[..split]);
        assert!(next_line(&mut buffer).is_none());

        buffer.extend_from_slice(&frame[split..]);
        let line = next_line(&mut buffer).expect("complete line");
        assert!(line.contains("café"));
        assert!(!line.contains('\u{FFFD}'));
    }

    #[test]
    fn parse_token_reads_delta_content() {
        let token = parse_token(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#)
            .expect("frame parsed");
        assert_eq!(token.as_deref(), Some("Hel"));
    }

    #[test]
    fn parse_token_skips_role_announcements() {
        let token = parse_token(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#)
            .expect("frame parsed");
        assert!(token.is_none());
    }

    #[test]
    fn parse_token_rejects_malformed_json() {
        let error = parse_token("{not json").unwrap_err();
        assert!(matches!(error, GenerationError::MalformedEvent(_)));
    }

    #[tokio::test]
    async fn stream_completion_forwards_tokens_until_done() {
        let server = MockServer::start_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"The sky \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"is blue — cerulean, even.\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"never sent\"}}]}\n\n",
        );
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model": "gpt-3.5-turbo", "stream": true}"#);
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(body);
            })
            .await;

        let client = test_client(&server);
        let stream = client
            .stream_completion("What color is the sky?".into())
            .await
            .expect("stream started");
        let tokens = collect_tokens(stream).await;

        mock.assert();
        assert_eq!(
            tokens,
            vec![
                "The sky ".to_string(),
                "is blue — cerulean, even.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn stream_completion_surfaces_provider_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).body("invalid api key");
            })
            .await;

        let client = test_client(&server);
        let error = client.stream_completion("hi".into()).await.err().unwrap();
        assert!(matches!(
            error,
            GenerationError::UnexpectedStatus { status, body }
                if status == reqwest::StatusCode::UNAUTHORIZED && body == "invalid api key"
        ));
    }
}
