use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{CatalogEntry, MediaType, RankedList, TrendingCandidate},
    services::{
        mood::Mood, scene_search::SceneMatch, similar_titles::SimilarTitles,
        vibe_search::{SearchMode, DEFAULT_LIMIT},
    },
};

use super::AppState;

/// Upper bound on a caller-chosen result count
pub const MAX_LIMIT: usize = 50;

fn effective_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct TextSearchRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub media_type: MediaType,
    pub limit: Option<usize>,
    #[serde(default)]
    pub mode: SearchMode,
}

#[derive(Debug, Serialize)]
pub struct TextSearchResponse {
    pub description: String,
    pub count: usize,
    #[serde(flatten)]
    pub ranked: RankedList,
}

#[derive(Debug, Deserialize)]
pub struct ImageSearchParams {
    #[serde(default, rename = "type")]
    pub media_type: MediaType,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct VideoSearchRequest {
    #[serde(default)]
    pub frames: Vec<String>,
    #[serde(default, rename = "type")]
    pub media_type: MediaType,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Deserialize)]
pub struct MoodQuery {
    #[serde(default)]
    pub mood: String,
    #[serde(default, rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Serialize)]
pub struct MoodResponse {
    pub mood: Mood,
    pub count: usize,
    pub results: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub count: usize,
    pub results: Vec<TrendingCandidate>,
}

impl From<Vec<TrendingCandidate>> for TrendingResponse {
    fn from(results: Vec<TrendingCandidate>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "ai_providers": state.providers.names(),
        })),
    )
}

/// POST /api/v1/scene-search/text
pub async fn search_by_text(
    State(state): State<AppState>,
    Json(request): Json<TextSearchRequest>,
) -> AppResult<Json<TextSearchResponse>> {
    let ranked = state
        .vibe_search
        .search(
            &request.description,
            request.media_type,
            effective_limit(request.limit),
            request.mode,
        )
        .await?;

    Ok(Json(TextSearchResponse {
        description: request.description,
        count: ranked.len(),
        ranked,
    }))
}

/// POST /api/v1/scene-search/image, raw image bytes as the body
pub async fn search_by_image(
    State(state): State<AppState>,
    Query(params): Query<ImageSearchParams>,
    body: Bytes,
) -> AppResult<Json<SceneMatch>> {
    if body.is_empty() {
        return Err(AppError::InvalidInput("No image provided".to_string()));
    }

    let found = state
        .scene_search
        .search_image(&body, params.media_type, effective_limit(params.limit))
        .await?;
    Ok(Json(found))
}

/// POST /api/v1/scene-search/video, frames as base64 strings or data URLs
pub async fn search_by_video(
    State(state): State<AppState>,
    Json(request): Json<VideoSearchRequest>,
) -> AppResult<Json<SceneMatch>> {
    if request.frames.is_empty() {
        return Err(AppError::InvalidInput("No video frames provided".to_string()));
    }

    let frames = request
        .frames
        .iter()
        .enumerate()
        .map(|(index, frame)| decode_frame(frame, index))
        .collect::<AppResult<Vec<_>>>()?;

    let found = state
        .scene_search
        .search_video(&frames, request.media_type, effective_limit(request.limit))
        .await?;
    Ok(Json(found))
}

/// GET /api/v1/movies/search
pub async fn search_similar(
    State(state): State<AppState>,
    Query(params): Query<SimilarQuery>,
) -> AppResult<Json<SimilarTitles>> {
    let similar = state
        .similar_titles
        .find_similar(&params.query, params.media_type)
        .await?;
    Ok(Json(similar))
}

/// GET /api/v1/movies/mood-search
pub async fn search_by_mood(
    State(state): State<AppState>,
    Query(params): Query<MoodQuery>,
) -> AppResult<Json<MoodResponse>> {
    let (mood, results) = state.mood_search.search(&params.mood, params.media_type).await?;
    Ok(Json(MoodResponse {
        mood,
        count: results.len(),
        results,
    }))
}

/// GET /api/v1/trending/movies
pub async fn trending_movies(State(state): State<AppState>) -> AppResult<Json<TrendingResponse>> {
    let ranked = state.trending.trending_movies().await?;
    Ok(Json(ranked.into()))
}

/// GET /api/v1/trending/tv
pub async fn trending_tv(State(state): State<AppState>) -> AppResult<Json<TrendingResponse>> {
    let ranked = state.trending.trending_series().await?;
    Ok(Json(ranked.into()))
}

fn decode_frame(frame: &str, index: usize) -> AppResult<Vec<u8>> {
    let payload = match frame.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => frame,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::InvalidInput(format!("Frame {} is not valid base64: {}", index, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(effective_limit(None), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(0)), 1);
        assert_eq!(effective_limit(Some(500)), MAX_LIMIT);
    }

    #[test]
    fn test_decode_frame_accepts_data_urls() {
        assert_eq!(decode_frame("aGk=", 0).unwrap(), b"hi");
        assert_eq!(decode_frame("data:image/jpeg;base64,aGk=", 0).unwrap(), b"hi");
        assert!(matches!(decode_frame("%%%", 3), Err(AppError::InvalidInput(_))));
    }
}
