use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ChatConfig, OpenAiConfig};
use crate::error::GenerationError;

/// Reply used whenever the chat backend cannot produce an answer.
pub const APOLOGY: &str = "عذراً، حدث خطأ أثناء معالجة طلبك.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Turns a user prompt into a text answer.
#[async_trait]
pub trait TextResponder: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Never fails: any backend error becomes [`APOLOGY`].
    async fn respond(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Text generation failed: {}", e);
                APOLOGY.to_string()
            }
        }
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    openai: OpenAiConfig,
    chat: ChatConfig,
}

impl ChatClient {
    pub fn new(openai: OpenAiConfig, chat: ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            openai,
            chat,
        }
    }
}

#[async_trait]
impl TextResponder for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.chat.model,
            messages: vec![
                ChatMessage::system(&self.chat.system_prompt),
                ChatMessage::user(prompt),
            ],
            max_tokens: self.chat.max_tokens,
        };

        let url = self.openai.endpoint("chat/completions");

        debug!("Sending chat completion request: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.openai.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let body = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GenerationError::Malformed("no content in first choice".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> ChatClient {
        ChatClient::new(
            OpenAiConfig {
                api_key: "sk-test".to_string(),
                base_url: server.url(),
            },
            ChatConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_complete_sends_fixed_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "كيف الحال"}
                ],
                "max_tokens": 300
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"بخير، شكراً!"}}]}"#)
            .create_async()
            .await;

        let answer = client_for(&server).complete("كيف الحال").await.unwrap();
        assert_eq!(answer, "بخير، شكراً!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_yields_apology() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Status { status, .. } if status.as_u16() == 500
        ));
        assert_eq!(client.respond("hello").await, APOLOGY);
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.complete("hello").await,
            Err(GenerationError::Malformed(_))
        ));
        assert_eq!(client.respond("hello").await, APOLOGY);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        assert!(matches!(
            client_for(&server).complete("hello").await,
            Err(GenerationError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_yields_apology() {
        let client = ChatClient::new(
            OpenAiConfig {
                api_key: "sk-test".to_string(),
                base_url: "http://127.0.0.1:1".to_string(),
            },
            ChatConfig::default(),
        );
        assert!(matches!(
            client.complete("hello").await,
            Err(GenerationError::Transport(_))
        ));
        let answer = client.respond("hello").await;
        assert_eq!(answer, APOLOGY);
        assert!(!answer.is_empty());
    }
}
