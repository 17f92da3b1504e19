//! Upstream chat completion client
//!
//! Opens a streaming chat completion and hands back the raw response body as a
//! byte stream. The body is newline-delimited: `data: {json chunk}` lines
//! terminated by `data: [DONE]`. Decoding is the relay's job.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Upstream chat engine failure
#[derive(Debug, Error)]
pub enum ChatEngineError {
    #[error("failed to create request: {0}")]
    Request(String),

    #[error("failed to analyze text, status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("error reading stream: {0}")]
    Read(String),
}

/// Live upstream byte stream
pub type ChatStream = BoxStream<'static, Result<Bytes, ChatEngineError>>;

/// Remote model that streams completions for a prompt
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn open_stream(&self, prompt: &str) -> Result<ChatStream, ChatEngineError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

/// SambaNova (OpenAI-compatible) chat completions client
pub struct SambaNovaClient {
    http_client: reqwest::Client,
    api_url: String,
    api_token: String,
    model: String,
}

impl SambaNovaClient {
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ChatEngineError> {
        // No overall timeout: completions stream for as long as the model writes
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChatEngineError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
            api_token: api_token.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatEngine for SambaNovaClient {
    async fn open_stream(&self, prompt: &str) -> Result<ChatStream, ChatEngineError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.api_url, "Failed to send streaming chat request");
                ChatEngineError::Request(e.to_string())
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = %status,
                error = %body,
                url = %self.api_url,
                "Chat API returned error status for streaming request"
            );
            return Err(ChatEngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(model = %self.model, "Upstream chat stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatEngineError::Read(e.to_string())))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut stream: ChatStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        body
    }

    #[tokio::test]
    async fn test_open_stream_sends_prompt_and_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n";

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::PartialJsonString(
                    r#"{"model":"test-model","stream":true}"#.to_string(),
                ),
                mockito::Matcher::Regex(r#""content":"Say hi""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = SambaNovaClient::new(
            format!("{}/v1/chat/completions", server.url()),
            "test-token",
            "test-model",
        )
        .unwrap();

        let stream = client.open_stream("Say hi").await.unwrap();
        assert_eq!(collect(stream).await, body.as_bytes());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_fails_to_open() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid token")
            .create_async()
            .await;

        let client = SambaNovaClient::new(
            format!("{}/v1/chat/completions", server.url()),
            "bad",
            "test-model",
        )
        .unwrap();

        match client.open_stream("prompt").await {
            Err(ChatEngineError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid token");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected open failure"),
        }
    }
}
