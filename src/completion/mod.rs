//! Completion client adapter for OpenAI-compatible chat endpoints
//!
//! A rejected credential surfaces as [`ChatError::Authentication`]; every
//! other provider-side failure is a [`ChatError::Completion`]. No retries are
//! performed.

use crate::config::CompletionConfig;
use crate::context::models::Message;
use crate::error::{ChatError, Result};
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Provider error code signalling a rejected key
const INVALID_API_KEY_CODE: &str = "invalid_api_key";

/// Parameters for one completion call
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Remote completion service
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one request and return the assistant reply text
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
        credential: &SecretString,
    ) -> Result<String>;
}

/// Client for `<base_url>/chat/completions`
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: CompletionRequest<'_>, credential: &SecretString) -> Result<String> {
        let body = ChatCompletionRequest {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = request.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Completion(format!("Request timed out: {}", e))
                } else {
                    ChatError::Completion(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Completion(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ChatError::Completion("No choices in response".to_string()))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
        credential: &SecretString,
    ) -> Result<String> {
        let start = Instant::now();
        let result = self.call(request, credential).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(ChatError::Authentication(_)) => "auth_error",
            Err(_) => "error",
        };
        METRICS.record_completion(outcome, start.elapsed().as_secs_f64());

        result
    }
}

/// Map a non-success response to the error taxonomy
fn classify_failure(status: StatusCode, body: &str) -> ChatError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let code = detail.as_ref().and_then(|d| d.code.as_deref());
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| body.to_string());

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code == Some(INVALID_API_KEY_CODE)
    {
        warn!(status = status.as_u16(), "Completion provider rejected the credential");
        return ChatError::Authentication("Invalid API key or insufficient permissions".into());
    }

    warn!(status = status.as_u16(), body = %message, "Provider returned error");
    if status == StatusCode::TOO_MANY_REQUESTS {
        ChatError::Completion(format!("Provider rate limit: {}", message))
    } else {
        ChatError::Completion(format!("Status {}: {}", status, message))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> OpenAiClient {
        OpenAiClient::new(&CompletionConfig {
            base_url: server.url(),
            timeout_ms: 5_000,
        })
        .unwrap()
    }

    fn request(messages: &[Message]) -> CompletionRequest<'_> {
        CompletionRequest {
            messages,
            model: "gpt-3.5-turbo",
            temperature: 0.5,
            max_tokens: 150,
        }
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OpenAiClient::new(&CompletionConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            timeout_ms: 1_000,
        })
        .unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-3.5-turbo",
                "temperature": 0.5,
                "max_tokens": 150,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}}]}"#)
            .create_async()
            .await;

        let messages = vec![Message::system("sys"), Message::user("hello")];
        let reply = client_for(&server)
            .complete(request(&messages), &SecretString::new("sk-test".into()))
            .await
            .unwrap();

        assert_eq!(reply, "Hi!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided","code":"invalid_api_key"}}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hello")];
        let result = client_for(&server)
            .complete(request(&messages), &SecretString::new("sk-bad".into()))
            .await;

        assert!(matches!(result, Err(ChatError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_invalid_key_code_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hello")];
        let result = client_for(&server)
            .complete(request(&messages), &SecretString::new("sk-bad".into()))
            .await;

        assert!(matches!(result, Err(ChatError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_completion_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let messages = vec![Message::user("hello")];
        let result = client_for(&server)
            .complete(request(&messages), &SecretString::new("sk-test".into()))
            .await;

        match result {
            Err(ChatError::Completion(msg)) => assert!(msg.contains("upstream exploded")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_and_malformed_are_completion_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"slow down","code":"rate_limit_exceeded"}}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hello")];
        let key = SecretString::new("sk-test".into());
        let result = client_for(&server).complete(request(&messages), &key).await;
        assert!(matches!(result, Err(ChatError::Completion(_))));

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;
        let result = client_for(&server).complete(request(&messages), &key).await;
        assert!(matches!(result, Err(ChatError::Completion(_))));
    }

    #[test]
    fn test_classify_forbidden() {
        let err = classify_failure(StatusCode::FORBIDDEN, "");
        assert!(matches!(err, ChatError::Authentication(_)));
    }
}
