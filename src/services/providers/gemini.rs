//! Google Gemini provider
//!
//! Identification uses `generateContent` with inline image data and a JSON
//! response MIME type. Embeddings use `text-embedding-004` (768 dimensions),
//! padded to the shared embedding width.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    services::providers::{
        fit_dimensions, mime_type, parse_identification, prompt_for, Identification,
        VisionProvider,
    },
};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const VISION_MODEL: &str = "gemini-1.5-flash";
const EMBEDDING_MODEL: &str = "text-embedding-004";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiProvider {
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

    async fn post(&self, model_action: &str, body: &serde_json::Value) -> AppResult<String> {
        let response = self
            .http_client
            .post(format!("{}/models/{}", self.api_url, model_action))
            .query(&[("key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.text().await?)
    }
}

fn identification_request(frames: &[Vec<u8>]) -> serde_json::Value {
    let mut parts = vec![json!({ "text": prompt_for(frames) })];
    parts.extend(frames.iter().map(|frame| {
        json!({
            "inline_data": {
                "mime_type": mime_type(frame),
                "data": STANDARD.encode(frame)
            }
        })
    }));

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

fn parse_generated(body: &str) -> AppResult<Identification> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse Gemini response: {}", e)))?;

    let text = response
        .candidates
        .into_iter()
        .flat_map(|c| c.content.parts)
        .find_map(|p| p.text)
        .ok_or_else(|| AppError::ExternalApi("Gemini returned no text".to_string()))?;

    parse_identification(&text)
}

fn parse_embedding(body: &str) -> AppResult<Vec<f32>> {
    let response: EmbedContentResponse = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse Gemini embedding: {}", e)))?;
    Ok(fit_dimensions(response.embedding.values))
}

#[async_trait::async_trait]
impl VisionProvider for GeminiProvider {
    async fn identify(&self, frames: &[Vec<u8>]) -> AppResult<Identification> {
        if frames.is_empty() {
            return Err(AppError::InvalidInput("No image to identify".to_string()));
        }

        let action = format!("{}:generateContent", VISION_MODEL);
        let body = self.post(&action, &identification_request(frames)).await?;
        parse_generated(&body)
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let action = format!("{}:embedContent", EMBEDDING_MODEL);
        let request = json!({
            "model": format!("models/{}", EMBEDDING_MODEL),
            "content": { "parts": [{ "text": text }] }
        });
        let body = self.post(&action, &request).await?;
        parse_embedding(&body)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
