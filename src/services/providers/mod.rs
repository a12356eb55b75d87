//! AI vision / embedding provider abstraction
//!
//! Providers are optional collaborators. The [`ProviderRegistry`] holds the
//! configured ones in priority order and falls through to the next provider
//! whenever one fails.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{Confidence, MediaType},
};

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Dimension every embedding is padded (or cut) to
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Frames sent for a video identification
const MAX_VIDEO_FRAMES: usize = 3;

pub(crate) const SYSTEM_PROMPT: &str = "You are a movie and TV show expert with extensive knowledge of films, actors, scenes, and cinematography. Your task is to identify movies from images with high accuracy.";

pub(crate) const IMAGE_PROMPT: &str = r#"Analyze this image carefully and try to identify the specific movie or TV show it's from.

Provide your response in the following JSON format:
{
  "identified": true or false,
  "movieTitle": "Exact movie/show title" or null,
  "year": release year as number or null,
  "type": "movie" or "tv" or null,
  "scene": "Brief description of this specific scene",
  "characters": ["Character names if recognizable"],
  "confidence": "high" or "medium" or "low",
  "reasoning": "Explain what visual cues helped you identify it, or why you couldn't identify it"
}

Be honest about your confidence level. Only mark as "identified: true" if you're reasonably confident about the movie title."#;

pub(crate) const VIDEO_PROMPT: &str = r#"Analyze these frames from a video clip and try to identify the specific movie or TV show.

Provide your response in the following JSON format:
{
  "identified": true or false,
  "movieTitle": "Exact movie/show title" or null,
  "year": release year as number or null,
  "type": "movie" or "tv" or null,
  "scene": "Brief description of this scene/sequence",
  "characters": ["Character names if recognizable"],
  "confidence": "high" or "medium" or "low",
  "reasoning": "Explain what visual cues across the frames helped you identify it, or why you couldn't"
}

Look for consistent elements across frames like characters, settings, cinematography style, or recognizable scenes."#;

/// A provider's best guess at the exact title shown in an image
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Identification {
    #[serde(default)]
    pub identified: bool,
    #[serde(default, alias = "movieTitle")]
    pub movie_title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, rename = "type")]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl Identification {
    pub fn not_identified() -> Self {
        Self::default()
    }

    /// Title to resolve against the catalog, if the guess is usable
    pub fn title(&self) -> Option<&str> {
        if !self.identified {
            return None;
        }
        self.movie_title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Trait for AI providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    /// Identify the title shown in one image or a handful of video frames
    async fn identify(&self, frames: &[Vec<u8>]) -> AppResult<Identification>;

    /// Embed text into a vector of [`EMBEDDING_DIMENSIONS`] floats
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Configured providers, highest priority first
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn VisionProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn VisionProvider>>) -> Self {
        Self { providers }
    }

    /// OpenAI first, then Gemini; either is skipped when its key is absent
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn VisionProvider>> = Vec::new();

        if let Some(key) = config.openai_api_key.as_deref().filter(|k| !k.is_empty()) {
            providers.push(Arc::new(OpenAiProvider::new(key.to_string())));
        }
        if let Some(key) = config.gemini_api_key.as_deref().filter(|k| !k.is_empty()) {
            providers.push(Arc::new(GeminiProvider::new(key.to_string())));
        }

        let registry = Self::new(providers);
        tracing::info!(providers = ?registry.names(), "AI provider registry ready");
        registry
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Asks each provider in turn; with no providers the answer is "not identified"
    #[instrument(skip(self, frames), fields(frames = frames.len()))]
    pub async fn identify(&self, frames: &[Vec<u8>]) -> AppResult<Identification> {
        if self.providers.is_empty() {
            tracing::debug!("No AI provider configured, skipping identification");
            return Ok(Identification::not_identified());
        }

        let frames = sample_frames(frames);
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.identify(&frames).await {
                Ok(identification) => {
                    tracing::info!(
                        provider = provider.name(),
                        identified = identification.identified,
                        title = identification.movie_title.as_deref().unwrap_or_default(),
                        "AI identification completed"
                    );
                    return Ok(identification);
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "AI identification failed");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(AppError::ExternalApi(format!(
            "All AI providers failed to identify: {}",
            failures.join("; ")
        )))
    }

    /// Embeds with the first provider that succeeds
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if self.providers.is_empty() {
            return Err(AppError::ProviderNotConfigured);
        }

        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Embedding failed");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(AppError::ExternalApi(format!(
            "All AI providers failed to embed: {}",
            failures.join("; ")
        )))
    }
}

/// First, middle and last frame of longer clips
pub fn sample_frames(frames: &[Vec<u8>]) -> Vec<Vec<u8>> {
    if frames.len() <= MAX_VIDEO_FRAMES {
        return frames.to_vec();
    }
    vec![
        frames[0].clone(),
        frames[frames.len() / 2].clone(),
        frames[frames.len() - 1].clone(),
    ]
}

pub(crate) fn prompt_for(frames: &[Vec<u8>]) -> &'static str {
    if frames.len() > 1 {
        VIDEO_PROMPT
    } else {
        IMAGE_PROMPT
    }
}

/// MIME type sniffed from the image header, JPEG when unknown
pub(crate) fn mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg")
}

/// Pads with zeros or truncates so vectors from different providers line up
pub(crate) fn fit_dimensions(mut vector: Vec<f32>) -> Vec<f32> {
    vector.resize(EMBEDDING_DIMENSIONS, 0.0);
    vector
}

/// Parses the JSON object a model returned as text
pub(crate) fn parse_identification(raw: &str) -> AppResult<Identification> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(trimmed).map_err(|e| {
        tracing::error!(error = %e, response = %raw, "Failed to parse AI identification");
        AppError::ExternalApi(format!("Invalid identification payload: {}", e))
    })
}
