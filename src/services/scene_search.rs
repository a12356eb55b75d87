//! Image and video scene search
//!
//! An AI provider is asked for an exact identification first. Whatever it
//! names is resolved against the catalog and kept out of the poster matcher's
//! results, which then supply visually similar titles.

use serde::Serialize;
use tracing::instrument;

use crate::{
    error::AppResult,
    models::{CatalogEntry, Confidence, ImageMatchResult, MediaType, ScoreScale, ScoredCandidate},
    services::{
        image_match::MatchOptions,
        providers::{Identification, ProviderRegistry},
        ImageMatchEngine, PacedCatalog,
    },
};

/// Which matcher produced the headline result
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    AiVision,
    ComputerVision,
}

/// A title named by an AI provider and found in the catalog
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AiPick {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub confidence: Confidence,
    pub scene: Option<String>,
    pub characters: Vec<String>,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SceneMatch {
    pub identified: bool,
    pub confidence: Confidence,
    pub identified_movie: Option<AiPick>,
    /// Poster matches; a confident computer-vision pick leads the list when
    /// no AI pick exists
    pub alternative_results: Vec<ScoredCandidate>,
    pub count: usize,
    pub source: MatchSource,
    pub ai_reasoning: Option<String>,
    pub score_scale: ScoreScale,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_analyzed: Option<usize>,
}

impl SceneMatch {
    fn assemble(ai: Option<AiPick>, ai_reasoning: Option<String>, visual: ImageMatchResult) -> Self {
        let mut alternatives = Vec::with_capacity(visual.alternative_results.len() + 1);
        if ai.is_none() {
            alternatives.extend(visual.identified_movie);
        }
        alternatives.extend(visual.alternative_results);

        let count = alternatives.len() + usize::from(ai.is_some());
        Self {
            identified: ai.is_some(),
            confidence: ai.as_ref().map_or(Confidence::Low, |pick| pick.confidence),
            source: if ai.is_some() {
                MatchSource::AiVision
            } else {
                MatchSource::ComputerVision
            },
            identified_movie: ai,
            alternative_results: alternatives,
            count,
            ai_reasoning,
            score_scale: ScoreScale::Percent,
            frames_analyzed: visual.frames_analyzed,
        }
    }
}

#[derive(Clone)]
pub struct SceneSearchEngine {
    catalog: PacedCatalog,
    providers: ProviderRegistry,
    matcher: ImageMatchEngine,
}

impl SceneSearchEngine {
    pub fn new(catalog: PacedCatalog, providers: ProviderRegistry, matcher: ImageMatchEngine) -> Self {
        Self {
            catalog,
            providers,
            matcher,
        }
    }

    #[instrument(skip(self, image), fields(bytes = image.len(), media_type = %media_type))]
    pub async fn search_image(&self, image: &[u8], media_type: MediaType, limit: usize) -> AppResult<SceneMatch> {
        let frames = [image.to_vec()];
        let (ai, reasoning) = self.ai_pick(&frames, media_type).await;

        let options = MatchOptions::new(media_type, limit).excluding(ai.as_ref().map(|p| p.entry.id));
        let visual = self.matcher.match_image(image, &options).await?;

        Ok(SceneMatch::assemble(ai, reasoning, visual))
    }

    #[instrument(skip(self, frames), fields(frames = frames.len(), media_type = %media_type))]
    pub async fn search_video(
        &self,
        frames: &[Vec<u8>],
        media_type: MediaType,
        limit: usize,
    ) -> AppResult<SceneMatch> {
        let (ai, reasoning) = if frames.is_empty() {
            (None, None)
        } else {
            self.ai_pick(frames, media_type).await
        };

        let options = MatchOptions::new(media_type, limit).excluding(ai.as_ref().map(|p| p.entry.id));
        let visual = self.matcher.match_video(frames, &options).await?;

        Ok(SceneMatch::assemble(ai, reasoning, visual))
    }

    /// Never fails: provider and lookup errors leave the search to the poster matcher
    async fn ai_pick(&self, frames: &[Vec<u8>], media_type: MediaType) -> (Option<AiPick>, Option<String>) {
        let identification = match self.providers.identify(frames).await {
            Ok(identification) => identification,
            Err(e) => {
                tracing::warn!(error = %e, "AI identification unavailable, using poster matching only");
                return (None, None);
            }
        };

        let reasoning = identification.reasoning.clone();
        let pick = self.resolve(identification, media_type).await;
        (pick, reasoning)
    }

    async fn resolve(&self, identification: Identification, media_type: MediaType) -> Option<AiPick> {
        let title = identification.title()?.to_string();
        let lookup_type = identification.media_type.unwrap_or(media_type);
        let client = self.catalog.client();

        let hits = match self
            .catalog
            .call("ai_title_lookup", || {
                client.search_by_title(&title, identification.year, lookup_type)
            })
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Catalog lookup for AI pick failed");
                return None;
            }
        };

        let Some(entry) = hits.into_iter().next() else {
            tracing::info!(title = %title, "AI-identified title not found in catalog");
            return None;
        };

        tracing::info!(id = entry.id, title = %entry.title, "AI pick resolved");
        Some(AiPick {
            entry,
            confidence: identification.confidence.unwrap_or(Confidence::Low),
            scene: identification.scene,
            characters: identification.characters,
            reasoning: identification.reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryPosterStore, PosterKey, PosterStore};
    use crate::error::AppError;
    use crate::services::catalog::MockCatalogClient;
    use crate::services::fingerprint::test_images::{png_bytes, split};
    use crate::services::providers::{MockVisionProvider, VisionProvider};
    use std::sync::Arc;

    fn red_poster() -> Vec<u8> {
        png_bytes(&split(100, 150, [220, 30, 30], [40, 10, 10]))
    }

    fn poster_entry(id: u64) -> CatalogEntry {
        let mut entry = CatalogEntry::new(id, format!("Movie {}", id), MediaType::Movie);
        entry.poster_path = Some(format!("/poster-{}.png", id));
        entry.vote_count = 1000;
        entry
    }

    fn catalog_with_corpus() -> MockCatalogClient {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_discover()
            .returning(|_, _| Ok(vec![poster_entry(42)]));
        catalog
    }

    fn engine(catalog: MockCatalogClient, providers: ProviderRegistry) -> SceneSearchEngine {
        let store = MemoryPosterStore::new();
        store.put(&PosterKey::new(MediaType::Movie, 42), red_poster());
        let catalog = PacedCatalog::without_pacing(Arc::new(catalog));
        let matcher = ImageMatchEngine::new(catalog.clone(), Arc::new(store));
        SceneSearchEngine::new(catalog, providers, matcher)
    }

    fn provider_naming(title: &'static str) -> ProviderRegistry {
        let mut provider = MockVisionProvider::new();
        provider.expect_identify().returning(move |_| {
            Ok(Identification {
                identified: true,
                movie_title: Some(title.to_string()),
                year: Some(1999),
                confidence: Some(Confidence::High),
                reasoning: Some("green code rain".to_string()),
                ..Identification::default()
            })
        });
        provider.expect_name().return_const("mock");
        ProviderRegistry::new(vec![Arc::new(provider) as Arc<dyn VisionProvider>])
    }

    #[tokio::test]
    async fn test_without_providers_poster_match_leads() {
        let engine = engine(catalog_with_corpus(), ProviderRegistry::default());

        let found = engine.search_image(&red_poster(), MediaType::Movie, 20).await.unwrap();

        assert!(!found.identified);
        assert_eq!(found.source, MatchSource::ComputerVision);
        assert_eq!(found.score_scale, ScoreScale::Percent);
        assert_eq!(found.alternative_results[0].id(), 42);
        assert_eq!(found.count, 1);
    }

    #[tokio::test]
    async fn test_ai_pick_is_excluded_from_poster_matches() {
        let mut catalog = catalog_with_corpus();
        catalog
            .expect_search_by_title()
            .withf(|title, year, _| title == "The Matrix" && *year == Some(1999))
            .times(1)
            .returning(|_, _, _| Ok(vec![poster_entry(42)]));

        let engine = engine(catalog, provider_naming("The Matrix"));
        let found = engine.search_image(&red_poster(), MediaType::Movie, 20).await.unwrap();

        assert!(found.identified);
        assert_eq!(found.source, MatchSource::AiVision);
        assert_eq!(found.confidence, Confidence::High);
        let pick = found.identified_movie.unwrap();
        assert_eq!(pick.entry.id, 42);
        assert_eq!(pick.reasoning.as_deref(), Some("green code rain"));
        assert!(found.alternative_results.iter().all(|c| c.id() != 42));
        assert_eq!(found.count, 1 + found.alternative_results.len());
    }

    #[tokio::test]
    async fn test_unresolved_ai_title_falls_back_to_poster_pick() {
        let mut catalog = catalog_with_corpus();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(vec![]));

        let engine = engine(catalog, provider_naming("Unknown Film"));
        let found = engine.search_image(&red_poster(), MediaType::Movie, 20).await.unwrap();

        assert!(!found.identified);
        assert_eq!(found.ai_reasoning.as_deref(), Some("green code rain"));
        assert_eq!(found.alternative_results[0].id(), 42);
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_fail_search() {
        let mut provider = MockVisionProvider::new();
        provider
            .expect_identify()
            .returning(|_| Err(AppError::ExternalApi("429".to_string())));
        provider.expect_name().return_const("mock");
        let registry = ProviderRegistry::new(vec![Arc::new(provider) as Arc<dyn VisionProvider>]);

        let engine = engine(catalog_with_corpus(), registry);
        let found = engine.search_image(&red_poster(), MediaType::Movie, 20).await.unwrap();

        assert_eq!(found.source, MatchSource::ComputerVision);
        assert!(found.ai_reasoning.is_none());
    }

    #[tokio::test]
    async fn test_video_reports_frames_analyzed() {
        let engine = engine(catalog_with_corpus(), ProviderRegistry::default());
        let frames = vec![red_poster(), b"not an image".to_vec(), red_poster()];

        let found = engine.search_video(&frames, MediaType::Movie, 20).await.unwrap();

        assert_eq!(found.frames_analyzed, Some(2));
        assert_eq!(found.alternative_results[0].id(), 42);
    }

    #[tokio::test]
    async fn test_video_without_frames_is_rejected() {
        let engine = engine(MockCatalogClient::new(), ProviderRegistry::default());
        let result = engine.search_video(&[], MediaType::Movie, 20).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
