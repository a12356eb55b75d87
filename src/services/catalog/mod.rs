//! Catalog lookup abstraction
//!
//! Engines only talk to the catalog through [`CatalogClient`], so tests can
//! swap the TMDB client for a mock. Implementations issue exactly one upstream
//! request per call; pacing and retries belong to the caller.

use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{CatalogEntry, MediaType},
};

pub mod tmdb;

pub use tmdb::TmdbClient;

/// Release-date restriction derived from free text or a ranking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateConstraint {
    /// Released during this calendar year
    Year(i32),
    /// Released within the (inclusive) bounds
    Range {
        gte: Option<NaiveDate>,
        lte: Option<NaiveDate>,
    },
}

/// Sort orders the discovery endpoint understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    PopularityDesc,
    RatingDesc,
}

impl SortOrder {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortOrder::PopularityDesc => "popularity.desc",
            SortOrder::RatingDesc => "vote_average.desc",
        }
    }
}

/// Filters for a discovery query
///
/// Genres are combined with AND semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverFilters {
    pub genre_ids: Vec<u32>,
    pub sort_by: SortOrder,
    pub min_vote_count: Option<u64>,
    pub date: Option<DateConstraint>,
    pub origin_country: Option<String>,
}

impl Default for DiscoverFilters {
    fn default() -> Self {
        Self {
            genre_ids: Vec::new(),
            sort_by: SortOrder::PopularityDesc,
            min_vote_count: None,
            date: None,
            origin_country: None,
        }
    }
}

impl DiscoverFilters {
    pub fn sorted_by(sort_by: SortOrder) -> Self {
        Self {
            sort_by,
            ..Self::default()
        }
    }

    pub fn with_genres(mut self, genre_ids: impl IntoIterator<Item = u32>) -> Self {
        self.genre_ids = genre_ids.into_iter().collect();
        self
    }

    pub fn with_min_votes(mut self, min_vote_count: u64) -> Self {
        self.min_vote_count = Some(min_vote_count);
        self
    }

    pub fn with_date(mut self, date: Option<DateConstraint>) -> Self {
        self.date = date;
        self
    }

    pub fn with_origin_country(mut self, country: impl Into<String>) -> Self {
        self.origin_country = Some(country.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendingWindow {
    Day,
    Week,
}

impl TrendingWindow {
    pub fn as_path(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        }
    }
}

/// Read-only access to the external movie catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Free-text title search, optionally narrowed to a release year
    async fn search_by_title(
        &self,
        query: &str,
        year: Option<i32>,
        media_type: MediaType,
    ) -> AppResult<Vec<CatalogEntry>>;

    async fn discover(
        &self,
        media_type: MediaType,
        filters: &DiscoverFilters,
    ) -> AppResult<Vec<CatalogEntry>>;

    /// Full record with keywords and billed cast
    async fn get_details(&self, id: u64, media_type: MediaType) -> AppResult<CatalogEntry>;

    async fn similar(&self, id: u64, media_type: MediaType) -> AppResult<Vec<CatalogEntry>>;

    async fn recommendations(&self, id: u64, media_type: MediaType)
        -> AppResult<Vec<CatalogEntry>>;

    async fn trending(
        &self,
        media_type: MediaType,
        window: TrendingWindow,
    ) -> AppResult<Vec<CatalogEntry>>;

    async fn upcoming(&self, region: &str) -> AppResult<Vec<CatalogEntry>>;

    async fn now_playing(&self, region: &str) -> AppResult<Vec<CatalogEntry>>;

    async fn popular(&self, media_type: MediaType, region: &str) -> AppResult<Vec<CatalogEntry>>;

    /// Raw bytes of a poster / backdrop path such as `/abc.jpg`
    async fn download_image(&self, path: &str) -> AppResult<Vec<u8>>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_filters_builder() {
        let filters = DiscoverFilters::sorted_by(SortOrder::RatingDesc)
            .with_genres([18, 36])
            .with_min_votes(1000)
            .with_date(Some(DateConstraint::Year(1994)));

        assert_eq!(filters.genre_ids, vec![18, 36]);
        assert_eq!(filters.sort_by.as_param(), "vote_average.desc");
        assert_eq!(filters.min_vote_count, Some(1000));
        assert_eq!(filters.date, Some(DateConstraint::Year(1994)));
        assert!(filters.origin_country.is_none());
    }
}
