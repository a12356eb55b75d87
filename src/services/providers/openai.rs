//! OpenAI provider
//!
//! Identification goes through `gpt-4o` chat completions with the frames as
//! base64 data URLs and a JSON-object response format. Embeddings use
//! `text-embedding-3-small`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    services::providers::{
        fit_dimensions, mime_type, parse_identification, prompt_for, Identification,
        VisionProvider, SYSTEM_PROMPT,
    },
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
const VISION_MODEL: &str = "gpt-4o";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_api_url(api_key, DEFAULT_API_URL.to_string())
    }

    pub fn with_api_url(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> AppResult<String> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.api_url, path))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OpenAI API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.text().await?)
    }
}

/// Request body for an identification call
fn identification_request(frames: &[Vec<u8>]) -> serde_json::Value {
    let mut content = vec![json!({ "type": "text", "text": prompt_for(frames) })];
    content.extend(frames.iter().map(|frame| {
        json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:{};base64,{}", mime_type(frame), STANDARD.encode(frame)),
                "detail": "high"
            }
        })
    }));

    json!({
        "model": VISION_MODEL,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": content }
        ],
        "response_format": { "type": "json_object" },
        "max_tokens": 500,
        "temperature": 0.3
    })
}

fn parse_completion(body: &str) -> AppResult<Identification> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OpenAI response: {}", e)))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::ExternalApi("OpenAI returned no message content".to_string()))?;

    parse_identification(&content)
}

fn parse_embedding(body: &str) -> AppResult<Vec<f32>> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OpenAI embedding: {}", e)))?;

    response
        .data
        .into_iter()
        .next()
        .map(|d| fit_dimensions(d.embedding))
        .ok_or_else(|| AppError::ExternalApi("OpenAI returned no embedding".to_string()))
}

#[async_trait::async_trait]
impl VisionProvider for OpenAiProvider {
    async fn identify(&self, frames: &[Vec<u8>]) -> AppResult<Identification> {
        if frames.is_empty() {
            return Err(AppError::InvalidInput("No image to identify".to_string()));
        }

        let body = self
            .post("chat/completions", &identification_request(frames))
            .await?;
        parse_completion(&body)
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let request = json!({ "model": EMBEDDING_MODEL, "input": text });
        let body = self.post("embeddings", &request).await?;
        parse_embedding(&body)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
