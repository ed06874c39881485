use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ImageConfig, OpenAiConfig};
use crate::error::{GenerationError, ImageError};

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: String,
    size: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Turns a user prompt into raw image bytes.
#[async_trait]
pub trait ImageResponder: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError>;
}

/// Client for an OpenAI-compatible `/images/generations` endpoint.
///
/// Generation returns a URL; the image itself is then downloaded with a plain,
/// unauthenticated GET.
pub struct ImageClient {
    client: reqwest::Client,
    openai: OpenAiConfig,
    image: ImageConfig,
}

impl ImageClient {
    pub fn new(openai: OpenAiConfig, image: ImageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            openai,
            image,
        }
    }

    async fn request_url(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ImageRequest {
            model: &self.image.model,
            prompt: self.image.render_prompt(prompt),
            size: &self.image.size,
            n: 1,
        };

        let url = self.openai.endpoint("images/generations");
        debug!("Sending image generation request: {}", url);

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
        let parsed: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| GenerationError::Malformed("no image URL in response".to_string()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status,
                body: String::new(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenerationError::Malformed("empty image body".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageResponder for ImageClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let url = self
            .request_url(prompt)
            .await
            .map_err(ImageError::Generation)?;

        let bytes = self.download(&url).await.map_err(ImageError::Fetch)?;

        info!("Generated image: {} bytes", bytes.len());
        Ok(bytes)
    }
}
