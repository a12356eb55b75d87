//! Free-text "describe the vibe" search
//!
//! The keyword mode maps a description onto catalog genres and salient terms,
//! gathers up to three candidate pools and ranks them with an additive score.
//! The embedding mode re-ranks the same pool by cosine similarity when an
//! embedding provider is configured.

use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{sort_by_score_desc, CatalogEntry, MediaType, RankedList, ScoreScale, ScoredCandidate},
    services::{
        catalog::{DiscoverFilters, SortOrder},
        providers::ProviderRegistry,
        taxonomy::{self, TaxonomyMatch},
        PacedCatalog,
    },
};

pub const DEFAULT_LIMIT: usize = 20;

const POOL_GENRES: usize = 3;
const GENRE_POOL_MIN_VOTES: u64 = 50;
const SEARCH_TERMS: usize = 5;
const FALLBACK_BELOW: usize = 10;
const FALLBACK_MIN_VOTES: u64 = 1000;

const TERM_POINTS: f64 = 2.0;
const GENRE_POINTS: f64 = 3.0;

const EMBEDDING_SHORTLIST: usize = 20;
const EMBEDDING_MIN_VOTES: u64 = 10;
const DETAIL_GROUP_SIZE: usize = 3;

/// How a text query is ranked
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    #[serde(alias = "ai")]
    Embedding,
}

/// Id-deduplicated candidates in arrival order
#[derive(Default)]
struct CandidatePool {
    seen: HashSet<u64>,
    entries: Vec<CatalogEntry>,
}

impl CandidatePool {
    fn extend(&mut self, entries: Vec<CatalogEntry>) {
        for entry in entries {
            if self.seen.insert(entry.id) {
                self.entries.push(entry);
            }
        }
    }

    fn unique_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries that carry enough text to be scored
    fn into_scorable(self) -> Vec<CatalogEntry> {
        self.entries.into_iter().filter(CatalogEntry::has_synopsis).collect()
    }
}

#[derive(Default)]
struct PoolOutcome {
    attempted: usize,
    failed: usize,
}

#[derive(Clone)]
pub struct VibeSearchEngine {
    catalog: PacedCatalog,
    providers: ProviderRegistry,
}

impl VibeSearchEngine {
    pub fn new(catalog: PacedCatalog, providers: ProviderRegistry) -> Self {
        Self { catalog, providers }
    }

    pub async fn search(
        &self,
        description: &str,
        media_type: MediaType,
        limit: usize,
        mode: SearchMode,
    ) -> AppResult<RankedList> {
        match mode {
            SearchMode::Keyword => self.search_by_description(description, media_type, limit).await,
            SearchMode::Embedding => self.search_by_embedding(description, media_type, limit).await,
        }
    }

    /// Keyword ranking on the additive scale
    #[instrument(skip(self, description), fields(media_type = %media_type))]
    pub async fn search_by_description(
        &self,
        description: &str,
        media_type: MediaType,
        limit: usize,
    ) -> AppResult<RankedList> {
        let taxonomy = self.map_description(description)?;
        let pool = self.gather_pool(&taxonomy, media_type).await?;
        Ok(keyword_ranking(pool, &taxonomy, limit))
    }

    /// Cosine re-rank on the unit scale, or keyword ranking without a provider
    #[instrument(skip(self, description), fields(media_type = %media_type))]
    pub async fn search_by_embedding(
        &self,
        description: &str,
        media_type: MediaType,
        limit: usize,
    ) -> AppResult<RankedList> {
        let taxonomy = self.map_description(description)?;
        let pool = self.gather_pool(&taxonomy, media_type).await?;

        if self.providers.is_empty() {
            tracing::info!("No embedding provider configured, using keyword ranking");
            return Ok(keyword_ranking(pool, &taxonomy, limit));
        }

        let query = match self.providers.embed(description).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Description embedding failed, using keyword ranking");
                return Ok(keyword_ranking(pool, &taxonomy, limit));
            }
        };

        let shortlist: Vec<CatalogEntry> = pool
            .into_iter()
            .filter(|e| e.vote_count > EMBEDDING_MIN_VOTES)
            .take(EMBEDDING_SHORTLIST)
            .collect();

        let mut ranked = Vec::with_capacity(shortlist.len());
        for (index, group) in shortlist.chunks(DETAIL_GROUP_SIZE).enumerate() {
            if index > 0 {
                self.catalog.scheduler().wait().await;
            }
            let scored = join_all(
                group
                    .iter()
                    .map(|entry| self.embed_candidate(entry, media_type, &query)),
            )
            .await;
            ranked.extend(scored.into_iter().flatten());
        }

        sort_by_score_desc(&mut ranked);
        ranked.truncate(limit);

        tracing::info!(
            shortlisted = shortlist.len(),
            returned = ranked.len(),
            "Embedding search completed"
        );

        Ok(RankedList::new(ScoreScale::Unit, ranked))
    }

    fn map_description(&self, description: &str) -> AppResult<TaxonomyMatch> {
        if description.trim().is_empty() {
            return Err(AppError::InvalidInput("Description is required".to_string()));
        }

        let taxonomy = taxonomy::map_to_taxonomy(description, Utc::now().date_naive());
        tracing::debug!(
            genres = ?taxonomy.genre_ids,
            terms = ?taxonomy.terms,
            date = ?taxonomy.date,
            "Description mapped"
        );
        Ok(taxonomy)
    }

    /// Genre discovery, then keyword search, then top-rated fallback
    ///
    /// Pools run one after another through the shared scheduler. A failing
    /// pool is logged and skipped; only when every attempted pool fails is the
    /// search reported as failed.
    async fn gather_pool(
        &self,
        taxonomy: &TaxonomyMatch,
        media_type: MediaType,
    ) -> AppResult<Vec<CatalogEntry>> {
        let client = self.catalog.client();
        let mut pool = CandidatePool::default();
        let mut outcome = PoolOutcome::default();

        if !taxonomy.genre_ids.is_empty() {
            let filters = DiscoverFilters::sorted_by(SortOrder::PopularityDesc)
                .with_genres(taxonomy.genre_ids.iter().take(POOL_GENRES).copied())
                .with_min_votes(GENRE_POOL_MIN_VOTES)
                .with_date(taxonomy.date);
            self.collect("genre", &mut pool, &mut outcome, || {
                client.discover(media_type, &filters)
            })
            .await;
        }

        if !taxonomy.terms.is_empty() {
            let query = taxonomy
                .terms
                .iter()
                .take(SEARCH_TERMS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            self.collect("keyword", &mut pool, &mut outcome, || {
                client.search_by_title(&query, None, media_type)
            })
            .await;
        }

        if pool.unique_count() < FALLBACK_BELOW {
            let filters = DiscoverFilters::sorted_by(SortOrder::RatingDesc)
                .with_min_votes(FALLBACK_MIN_VOTES)
                .with_date(taxonomy.date);
            self.collect("top_rated", &mut pool, &mut outcome, || {
                client.discover(media_type, &filters)
            })
            .await;
        }

        if outcome.attempted > 0 && outcome.failed == outcome.attempted {
            return Err(AppError::SearchFailed(
                "every candidate pool failed".to_string(),
            ));
        }

        let unique = pool.unique_count();
        let scorable = pool.into_scorable();
        tracing::info!(
            unique,
            scorable = scorable.len(),
            failed_pools = outcome.failed,
            "Candidate pool gathered"
        );

        Ok(scorable)
    }

    async fn collect<F, Fut>(
        &self,
        label: &str,
        pool: &mut CandidatePool,
        outcome: &mut PoolOutcome,
        fetch: F,
    ) where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<Vec<CatalogEntry>>>,
    {
        outcome.attempted += 1;
        match self.catalog.call(label, fetch).await {
            Ok(entries) => {
                tracing::debug!(pool = label, count = entries.len(), "Pool fetched");
                pool.extend(entries);
            }
            Err(e) => {
                outcome.failed += 1;
                tracing::warn!(pool = label, error = %e, "Candidate pool failed, skipping");
            }
        }
    }

    async fn embed_candidate(
        &self,
        entry: &CatalogEntry,
        media_type: MediaType,
        query: &[f32],
    ) -> Option<ScoredCandidate> {
        let client = self.catalog.client();
        let details = match self
            .catalog
            .retry()
            .run("vibe_details", || client.get_details(entry.id, media_type))
            .await
        {
            Ok(details) => details,
            Err(e) => {
                tracing::debug!(id = entry.id, error = %e, "Skipping candidate without details");
                return None;
            }
        };

        match self.providers.embed(&embedding_text(&details)).await {
            Ok(vector) => {
                let score = cosine_similarity(query, &vector);
                Some(ScoredCandidate::new(details, score))
            }
            Err(e) => {
                tracing::debug!(id = entry.id, error = %e, "Skipping candidate without embedding");
                None
            }
        }
    }
}

/// `+2` per salient term in the title or synopsis, `+3` per shared genre,
/// plus popularity / 100 and rating / 2
pub fn keyword_score(entry: &CatalogEntry, taxonomy: &TaxonomyMatch) -> f64 {
    let text = entry.searchable_text();
    let term_hits = taxonomy
        .terms
        .iter()
        .filter(|term| text.contains(term.as_str()))
        .count();
    let genre_hits = taxonomy
        .genre_ids
        .iter()
        .filter(|id| entry.genre_ids.contains(id))
        .count();

    term_hits as f64 * TERM_POINTS
        + genre_hits as f64 * GENRE_POINTS
        + entry.popularity / 100.0
        + entry.rating / 2.0
}

fn keyword_ranking(pool: Vec<CatalogEntry>, taxonomy: &TaxonomyMatch, limit: usize) -> RankedList {
    let mut ranked: Vec<ScoredCandidate> = pool
        .into_iter()
        .map(|entry| {
            let score = keyword_score(&entry, taxonomy);
            ScoredCandidate::new(entry, score)
        })
        .collect();

    sort_by_score_desc(&mut ranked);
    ranked.truncate(limit);

    tracing::info!(returned = ranked.len(), "Keyword search completed");
    RankedList::new(ScoreScale::Additive, ranked)
}

/// Text an entry is embedded from
pub fn embedding_text(entry: &CatalogEntry) -> String {
    let genres: Vec<&str> = entry
        .genre_ids
        .iter()
        .filter_map(|id| taxonomy::genre_name(*id))
        .collect();
    let keywords: Vec<&str> = entry.keywords.iter().map(String::as_str).collect();

    format!(
        "Title: {}. Overview: {}. Genres: {}. Keywords: {}.",
        entry.title,
        entry.overview.as_deref().unwrap_or_default(),
        genres.join(", "),
        keywords.join(", ")
    )
}

/// Cosine similarity over the common prefix; 0 when either vector is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
        let (x, y) = (*x as f64, *y as f64);
        (dot + x * y, na + x * x, nb + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MockCatalogClient;
    use crate::services::providers::{MockVisionProvider, VisionProvider};
    use std::sync::Arc;

    fn entry(id: u64, title: &str, overview: &str, genres: &[u32], popularity: f64) -> CatalogEntry {
        let mut entry = CatalogEntry::new(id, title, MediaType::Movie);
        entry.overview = (!overview.is_empty()).then(|| overview.to_string());
        entry.genre_ids = genres.iter().copied().collect();
        entry.popularity = popularity;
        entry.rating = 7.0;
        entry.vote_count = 500;
        entry
    }

    fn filler(count: u64) -> Vec<CatalogEntry> {
        (100..100 + count)
            .map(|id| entry(id, "Filler", "Something happens", &[], 1.0))
            .collect()
    }

    fn engine(catalog: MockCatalogClient) -> VibeSearchEngine {
        VibeSearchEngine::new(
            PacedCatalog::without_pacing(Arc::new(catalog)),
            ProviderRegistry::default(),
        )
    }

    fn assert_sorted(list: &RankedList) {
        assert!(list
            .results
            .windows(2)
            .all(|w| w[0].match_score >= w[1].match_score));
    }

    #[tokio::test]
    async fn test_empty_description_is_rejected() {
        let engine = engine(MockCatalogClient::new());
        let result = engine
            .search_by_description("   ", MediaType::Movie, 10)
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_genre_and_keyword_pools_are_ranked() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_discover()
            .withf(|_, filters| {
                filters.sort_by == SortOrder::PopularityDesc
                    && filters.genre_ids == vec![27, 53, 80]
                    && filters.min_vote_count == Some(GENRE_POOL_MIN_VOTES)
            })
            .times(1)
            .returning(|_, _| {
                let mut pool = filler(8);
                pool.push(entry(1, "Neon Heist", "A cyberpunk heist in a dark city", &[878, 80], 50.0));
                pool.push(entry(2, "No Synopsis", "", &[878], 900.0));
                Ok(pool)
            });
        catalog
            .expect_search_by_title()
            .withf(|query, year, _| query.starts_with("dark") && year.is_none())
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    entry(1, "Neon Heist", "A cyberpunk heist in a dark city", &[878, 80], 50.0),
                    entry(3, "Quiet Farm", "Sheep and a tractor", &[18], 5.0),
                ])
            });

        let list = engine(catalog)
            .search_by_description("dark cyberpunk heist", MediaType::Movie, 5)
            .await
            .unwrap();

        assert_eq!(list.score_scale, ScoreScale::Additive);
        assert_eq!(list.len(), 5);
        assert_eq!(list.results[0].id(), 1);
        assert!(list.results.iter().all(|c| c.id() != 2));
        assert_sorted(&list);
    }

    #[tokio::test]
    async fn test_small_pool_triggers_top_rated_fallback() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(vec![entry(1, "Lighthouse", "A keeper alone", &[], 2.0)]));
        catalog
            .expect_discover()
            .withf(|_, filters| {
                filters.sort_by == SortOrder::RatingDesc
                    && filters.min_vote_count == Some(FALLBACK_MIN_VOTES)
                    && filters.genre_ids.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(filler(3)));

        let list = engine(catalog)
            .search_by_description("harbor keeper", MediaType::Movie, 20)
            .await
            .unwrap();

        assert_eq!(list.len(), 4);
        assert_eq!(list.results[0].id(), 1);
    }

    #[tokio::test]
    async fn test_partial_pool_failure_is_tolerated() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_discover()
            .returning(|_, filters| match filters.sort_by {
                SortOrder::PopularityDesc => Err(AppError::ExternalApi("503".to_string())),
                SortOrder::RatingDesc => Ok(filler(2)),
            });
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Err(AppError::ExternalApi("timeout".to_string())));

        let list = engine(catalog)
            .search_by_description("ghost in a haunted house", MediaType::Movie, 20)
            .await
            .unwrap();

        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_every_pool_failing_is_a_search_failure() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_discover()
            .returning(|_, _| Err(AppError::ExternalApi("down".to_string())));
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Err(AppError::ExternalApi("down".to_string())));

        let result = engine(catalog)
            .search_by_description("ghost in a haunted house", MediaType::Movie, 20)
            .await;

        assert!(matches!(result, Err(AppError::SearchFailed(_))));
    }

    #[test]
    fn test_keyword_score_components() {
        let taxonomy = TaxonomyMatch {
            genre_ids: vec![878, 28],
            terms: vec!["neon".to_string(), "heist".to_string(), "robot".to_string()],
            date: None,
        };
        let candidate = entry(1, "Neon Heist", "A job goes wrong", &[878, 18], 200.0);

        // 2 terms, 1 genre, popularity 200, rating 7
        assert_eq!(keyword_score(&candidate, &taxonomy), 4.0 + 3.0 + 2.0 + 3.5);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        // Extra dimensions on one side are ignored
        assert!((cosine_similarity(&[1.0, 1.0], &[1.0, 1.0, 5.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_embedding_text_includes_genre_names() {
        let mut candidate = entry(1, "Alpha", "Hero saves day", &[28], 1.0);
        candidate = candidate.with_keywords(["superhero"]);
        let text = embedding_text(&candidate);
        assert!(text.contains("Title: Alpha"));
        assert!(text.contains("Action"));
        assert!(text.contains("superhero"));
    }

    #[tokio::test]
    async fn test_embedding_mode_without_provider_uses_keyword_scale() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(filler(12)));

        let list = engine(catalog)
            .search("marathon runner", MediaType::Movie, 5, SearchMode::Embedding)
            .await
            .unwrap();

        assert_eq!(list.score_scale, ScoreScale::Additive);
        assert_eq!(list.len(), 5);
    }

    #[tokio::test]
    async fn test_embedding_mode_ranks_by_cosine() {
        let mut catalog = MockCatalogClient::new();
        catalog.expect_search_by_title().returning(|_, _, _| {
            let mut pool = filler(10);
            pool.insert(0, entry(1, "Ocean Drift", "Sailing at night", &[], 1.0));
            Ok(pool)
        });
        catalog
            .expect_get_details()
            .returning(|id, _| {
                if id == 1 {
                    Ok(entry(1, "Ocean Drift", "Sailing at night", &[], 1.0))
                } else {
                    Ok(entry(id, "Filler", "Something happens", &[], 1.0))
                }
            });

        let mut provider = MockVisionProvider::new();
        provider.expect_embed().returning(|text| {
            if text.contains("Ocean") || text == "ocean sailing night" {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        });
        provider.expect_name().return_const("mock");

        let providers: Vec<Arc<dyn VisionProvider>> = vec![Arc::new(provider)];
        let engine = VibeSearchEngine::new(
            PacedCatalog::without_pacing(Arc::new(catalog)),
            ProviderRegistry::new(providers),
        );

        let list = engine
            .search_by_embedding("ocean sailing night", MediaType::Movie, 3)
            .await
            .unwrap();

        assert_eq!(list.score_scale, ScoreScale::Unit);
        assert_eq!(list.results[0].id(), 1);
        assert!((list.results[0].match_score - 1.0).abs() < 1e-9);
        assert_eq!(list.len(), 3);
        assert_sorted(&list);
    }
}
