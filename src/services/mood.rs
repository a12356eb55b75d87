use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogEntry, MediaType},
    services::{
        catalog::{DiscoverFilters, SortOrder},
        PacedCatalog,
    },
};

pub const MOOD_RESULTS: usize = 20;
const DEFAULT_MIN_VOTES: u64 = 20;

/// Closed set of moods a user can browse by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Scary,
    Nostalgic,
    Relaxed,
    Excited,
    Happy,
    Sad,
    Angry,
    Inspired,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Scary,
        Mood::Nostalgic,
        Mood::Relaxed,
        Mood::Excited,
        Mood::Happy,
        Mood::Sad,
        Mood::Angry,
        Mood::Inspired,
    ];

    /// Genres that must all be present
    pub fn genre_ids(&self) -> &'static [u32] {
        match self {
            Mood::Scary => &[27, 53],
            Mood::Nostalgic => &[18, 10751],
            Mood::Relaxed => &[35, 10749, 10751],
            Mood::Excited => &[28, 12, 53],
            Mood::Happy => &[35, 16, 10751],
            Mood::Sad => &[18, 10749],
            Mood::Angry => &[28, 80, 53],
            Mood::Inspired => &[99, 18],
        }
    }

    pub fn sort_order(&self) -> SortOrder {
        match self {
            Mood::Nostalgic | Mood::Sad | Mood::Inspired => SortOrder::RatingDesc,
            _ => SortOrder::PopularityDesc,
        }
    }

    pub fn min_vote_count(&self) -> u64 {
        match self {
            Mood::Nostalgic => 100,
            Mood::Sad | Mood::Inspired => 50,
            _ => DEFAULT_MIN_VOTES,
        }
    }

    pub fn filters(&self) -> DiscoverFilters {
        DiscoverFilters::sorted_by(self.sort_order())
            .with_genres(self.genre_ids().iter().copied())
            .with_min_votes(self.min_vote_count())
    }
}

impl FromStr for Mood {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.to_string() == wanted)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid mood: {}", s)))
    }
}

impl Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mood::Scary => "scary",
            Mood::Nostalgic => "nostalgic",
            Mood::Relaxed => "relaxed",
            Mood::Excited => "excited",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Angry => "angry",
            Mood::Inspired => "inspired",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone)]
pub struct MoodSearchEngine {
    catalog: PacedCatalog,
}

impl MoodSearchEngine {
    pub fn new(catalog: PacedCatalog) -> Self {
        Self { catalog }
    }

    /// One discovery call; results keep the catalog's order
    #[instrument(skip(self), fields(media_type = %media_type))]
    pub async fn search(&self, mood: &str, media_type: MediaType) -> AppResult<(Mood, Vec<CatalogEntry>)> {
        let mood: Mood = mood.parse()?;
        let filters = mood.filters();
        let client = self.catalog.client();

        let mut entries = self
            .catalog
            .call("mood_discover", || client.discover(media_type, &filters))
            .await?;
        entries.truncate(MOOD_RESULTS);

        tracing::info!(mood = %mood, returned = entries.len(), "Mood search completed");
        Ok((mood, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MockCatalogClient;
    use std::sync::Arc;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Scary".parse::<Mood>().unwrap(), Mood::Scary);
        assert_eq!(" inspired ".parse::<Mood>().unwrap(), Mood::Inspired);
        assert!(matches!("bored".parse::<Mood>(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_mood_filters() {
        let nostalgic = Mood::Nostalgic.filters();
        assert_eq!(nostalgic.genre_ids, vec![18, 10751]);
        assert_eq!(nostalgic.sort_by, SortOrder::RatingDesc);
        assert_eq!(nostalgic.min_vote_count, Some(100));

        let angry = Mood::Angry.filters();
        assert_eq!(angry.sort_by, SortOrder::PopularityDesc);
        assert_eq!(angry.min_vote_count, Some(DEFAULT_MIN_VOTES));
    }

    #[tokio::test]
    async fn test_search_truncates_to_twenty() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_discover()
            .withf(|_, filters| filters.genre_ids == vec![27, 53])
            .times(1)
            .returning(|media, _| {
                Ok((1..=30)
                    .map(|id| CatalogEntry::new(id, format!("Title {}", id), media))
                    .collect())
            });

        let engine = MoodSearchEngine::new(PacedCatalog::without_pacing(Arc::new(catalog)));
        let (mood, entries) = engine.search("scary", MediaType::Series).await.unwrap();

        assert_eq!(mood, Mood::Scary);
        assert_eq!(entries.len(), MOOD_RESULTS);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].media_type, MediaType::Series);
    }

    #[tokio::test]
    async fn test_unknown_mood_makes_no_request() {
        let engine = MoodSearchEngine::new(PacedCatalog::without_pacing(Arc::new(MockCatalogClient::new())));
        let result = engine.search("sleepy", MediaType::Movie).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
