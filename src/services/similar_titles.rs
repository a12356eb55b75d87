//! "Search a title, show similar ones" flow
//!
//! The first search hit becomes the primary entry. Similar and recommended
//! lists are merged, fetched in full and ranked with
//! [`similarity::score`](crate::services::similarity::score).

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{sort_by_score_desc, CatalogEntry, MediaType, RankedList, ScoreScale, ScoredCandidate},
    services::{
        similarity::{self, VibeVector},
        PacedCatalog,
    },
};

/// Merged candidates fetched in full
const MAX_CANDIDATES: usize = 30;
pub const MAX_RESULTS: usize = 20;
const DETAIL_GROUP_SIZE: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarTitles {
    /// `None` when the search found nothing
    pub primary: Option<CatalogEntry>,
    #[serde(flatten)]
    pub ranked: RankedList,
}

#[derive(Clone)]
pub struct SimilarTitlesEngine {
    catalog: PacedCatalog,
}

impl SimilarTitlesEngine {
    pub fn new(catalog: PacedCatalog) -> Self {
        Self { catalog }
    }

    #[instrument(skip(self), fields(media_type = %media_type))]
    pub async fn find_similar(&self, query: &str, media_type: MediaType) -> AppResult<SimilarTitles> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Query required".to_string()));
        }

        let client = self.catalog.client();
        let hits = self
            .catalog
            .call("title_search", || client.search_by_title(query, None, media_type))
            .await?;

        let Some(hit) = hits.into_iter().next() else {
            tracing::info!("No title matched the query");
            return Ok(SimilarTitles {
                primary: None,
                ranked: RankedList::new(ScoreScale::Unit, Vec::new()),
            });
        };

        // Without details the primary is scored from its search entry and a
        // neutral vibe
        let hit_id = hit.id;
        let (primary, primary_vibes) = match self
            .catalog
            .call("primary_details", || client.get_details(hit_id, media_type))
            .await
        {
            Ok(details) => {
                let vibes = VibeVector::from_entry(&details);
                (details, Some(vibes))
            }
            Err(e) => {
                tracing::warn!(id = hit_id, error = %e, "Primary details unavailable");
                (hit, None)
            }
        };

        let candidates = self.related(&primary, media_type).await;

        let mut ranked = Vec::with_capacity(candidates.len());
        for (index, group) in candidates.chunks(DETAIL_GROUP_SIZE).enumerate() {
            if index > 0 {
                self.catalog.scheduler().wait().await;
            }
            let details = join_all(group.iter().map(|c| self.details(c.id, media_type))).await;

            for candidate in details.into_iter().flatten() {
                let vibes = VibeVector::from_entry(&candidate);
                let score = similarity::score(&primary, &candidate, primary_vibes.as_ref(), Some(&vibes));
                ranked.push(ScoredCandidate::new(candidate, score));
            }
        }

        sort_by_score_desc(&mut ranked);
        ranked.truncate(MAX_RESULTS);

        tracing::info!(
            primary = primary.id,
            candidates = candidates.len(),
            returned = ranked.len(),
            "Similar titles ranked"
        );

        Ok(SimilarTitles {
            primary: Some(primary),
            ranked: RankedList::new(ScoreScale::Unit, ranked),
        })
    }

    /// Similar followed by recommended titles, deduplicated and capped
    async fn related(&self, primary: &CatalogEntry, media_type: MediaType) -> Vec<CatalogEntry> {
        let client = self.catalog.client();
        let mut merged = Vec::new();

        match self
            .catalog
            .call("similar", || client.similar(primary.id, media_type))
            .await
        {
            Ok(entries) => merged.extend(entries),
            Err(e) => tracing::warn!(error = %e, "Similar titles unavailable"),
        }
        match self
            .catalog
            .call("recommendations", || client.recommendations(primary.id, media_type))
            .await
        {
            Ok(entries) => merged.extend(entries),
            Err(e) => tracing::warn!(error = %e, "Recommendations unavailable"),
        }

        let mut seen = HashSet::new();
        merged.retain(|entry| seen.insert(entry.id));
        merged.truncate(MAX_CANDIDATES);
        merged
    }

    async fn details(&self, id: u64, media_type: MediaType) -> Option<CatalogEntry> {
        let client = self.catalog.client();
        match self
            .catalog
            .retry()
            .run("candidate_details", || client.get_details(id, media_type))
            .await
        {
            Ok(details) => Some(details),
            Err(e) => {
                tracing::debug!(id, error = %e, "Skipping candidate without details");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MockCatalogClient;
    use std::sync::Arc;

    /// Action, rated 8.0, nothing else
    fn alpha() -> CatalogEntry {
        let mut entry = CatalogEntry::new(1, "Alpha", MediaType::Movie);
        entry.genre_ids = [28].into_iter().collect();
        entry.rating = 8.0;
        entry
    }

    fn other(id: u64, genres: &[u32], rating: f64) -> CatalogEntry {
        let mut entry = CatalogEntry::new(id, format!("Other {}", id), MediaType::Movie);
        entry.genre_ids = genres.iter().copied().collect();
        entry.rating = rating;
        entry
    }

    fn engine(catalog: MockCatalogClient) -> SimilarTitlesEngine {
        SimilarTitlesEngine::new(PacedCatalog::without_pacing(Arc::new(catalog)))
    }

    #[tokio::test]
    async fn test_title_similar_to_itself_scores_one() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(vec![alpha()]));
        catalog.expect_get_details().returning(|_, _| Ok(alpha()));
        catalog.expect_similar().returning(|_, _| Ok(vec![alpha()]));
        catalog.expect_recommendations().returning(|_, _| Ok(vec![]));

        let similar = engine(catalog).find_similar("alpha", MediaType::Movie).await.unwrap();

        let primary = similar.primary.unwrap();
        assert_eq!(primary.id, 1);
        assert!(primary.keywords.is_empty() && primary.cast_ids.is_empty());
        assert_eq!(similar.ranked.score_scale, ScoreScale::Unit);
        assert_eq!(similar.ranked.len(), 1);
        assert!((similar.ranked.results[0].match_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_candidates_are_merged_ranked_and_skipped_on_failure() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(vec![alpha()]));
        catalog.expect_get_details().returning(|id, _| match id {
            1 => Ok(alpha()),
            2 => Ok(other(2, &[18], 3.0)),
            3 => Ok(other(3, &[28], 8.0)),
            _ => Err(AppError::NotFound(format!("movie {}", id))),
        });
        catalog
            .expect_similar()
            .returning(|_, _| Ok(vec![other(2, &[], 0.0), other(4, &[], 0.0)]));
        catalog
            .expect_recommendations()
            .returning(|_, _| Ok(vec![other(2, &[], 0.0), other(3, &[], 0.0)]));

        let similar = engine(catalog).find_similar("alpha", MediaType::Movie).await.unwrap();
        let ids: Vec<u64> = similar.ranked.results.iter().map(|c| c.id()).collect();

        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_primary_without_details_uses_search_entry() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(vec![alpha()]));
        catalog.expect_get_details().returning(|id, _| {
            if id == 1 {
                Err(AppError::NotFound("movie 1".to_string()))
            } else {
                Ok(other(id, &[28], 8.0))
            }
        });
        catalog.expect_similar().returning(|_, _| Ok(vec![other(5, &[], 0.0)]));
        catalog
            .expect_recommendations()
            .returning(|_, _| Err(AppError::ExternalApi("502".to_string())));

        let similar = engine(catalog).find_similar("alpha", MediaType::Movie).await.unwrap();

        assert_eq!(similar.primary.unwrap().title, "Alpha");
        // Genres, rating and the empty keyword/cast sets all match; primary
        // vibes are missing so that factor is neutral
        let expected = 0.25 + 0.25 + 0.15 + 0.15 + 0.5 * 0.20;
        assert!((similar.ranked.results[0].match_score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_search_hit_is_an_empty_result() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_by_title()
            .returning(|_, _, _| Ok(vec![]));

        let similar = engine(catalog).find_similar("zzz", MediaType::Movie).await.unwrap();
        assert!(similar.primary.is_none());
        assert!(similar.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let result = engine(MockCatalogClient::new())
            .find_similar(" ", MediaType::Movie)
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
