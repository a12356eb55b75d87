//! "Talk of the town" trending lists
//!
//! Movies favour upcoming and freshly released titles and only keep older
//! ones that are trending today. Series are ranked by a weighted mix of
//! recency, popularity and rating quality.

use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashSet;
use std::future::Future;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogEntry, MediaType, TrendingCandidate, TrendingStatus},
    services::{
        catalog::{DateConstraint, DiscoverFilters, SortOrder, TrendingWindow},
        PacedCatalog,
    },
};

pub const TRENDING_LIMIT: usize = 20;

const UPCOMING_BASE: f64 = 1000.0;
const FRESH_BASE: f64 = 500.0;
const VIRAL_BASE: f64 = 100.0;
const FRESH_WINDOW_DAYS: i64 = 90;
const PROVEN_VOTES: u64 = 1000;
const PROVEN_BONUS: f64 = 50.0;

const TV_RECENCY_DAYS: f64 = 1095.0;
const TV_RECENCY_WEIGHT: f64 = 30.0;
const TV_POPULARITY_WEIGHT: f64 = 40.0;
const TV_RATING_WEIGHT: f64 = 30.0;
const TV_DISCOVER_MIN_VOTES: u64 = 3;
const TV_LOOKBACK_YEARS: i32 = 3;

/// Which upstream list an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSource {
    Trending,
    Upcoming,
    NowPlaying,
    Popular,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcedEntry {
    pub entry: CatalogEntry,
    pub source: PoolSource,
}

/// Score and status of one movie relative to `today`
///
/// A missing release date counts as a very old release.
pub fn score_movie(entry: &CatalogEntry, source: PoolSource, today: NaiveDate) -> (f64, TrendingStatus) {
    let days_diff = entry
        .release_date
        .map(|date| (date - today).num_days())
        .unwrap_or(i64::MIN);

    let (mut score, status) = if days_diff > 0 {
        (UPCOMING_BASE + entry.popularity / 10.0, TrendingStatus::Upcoming)
    } else if days_diff > -FRESH_WINDOW_DAYS {
        let recency = 100.0 / (days_diff.unsigned_abs() as f64 + 1.0);
        (FRESH_BASE + entry.popularity / 5.0 + recency, TrendingStatus::Fresh)
    } else if source == PoolSource::Trending {
        (VIRAL_BASE + entry.popularity / 20.0, TrendingStatus::ViralOld)
    } else {
        (0.0, TrendingStatus::Dead)
    };

    if entry.vote_count > PROVEN_VOTES {
        score += PROVEN_BONUS;
    }

    (score, status)
}

/// Language filter, scoring and the hard `dead` cut for movies
pub fn rank_movies(pool: Vec<SourcedEntry>, languages: &[String], today: NaiveDate) -> Vec<TrendingCandidate> {
    let mut ranked: Vec<TrendingCandidate> = pool
        .into_iter()
        .filter(|sourced| speaks_any(&sourced.entry, languages))
        .filter_map(|SourcedEntry { entry, source }| {
            let (score, status) = score_movie(&entry, source, today);
            (status != TrendingStatus::Dead).then_some(TrendingCandidate {
                entry,
                score,
                status: Some(status),
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(TRENDING_LIMIT);
    ranked
}

/// `30·recency + 40·popularity/100 + 30·rating·log10(votes + 1)`
///
/// Recency decays linearly to zero over three years; a series without a
/// first-air date gets none.
pub fn score_series(entry: &CatalogEntry, today: NaiveDate) -> f64 {
    let recency = entry
        .release_date
        .map(|aired| {
            let days_since = (today - aired).num_days() as f64;
            (1.0 - days_since / TV_RECENCY_DAYS).max(0.0)
        })
        .unwrap_or(0.0);
    let popularity = entry.popularity / 100.0;
    let rating_quality = entry.rating * (entry.vote_count as f64 + 1.0).log10();

    recency * TV_RECENCY_WEIGHT + popularity * TV_POPULARITY_WEIGHT + rating_quality * TV_RATING_WEIGHT
}

/// Language filter and weighted ranking for series; nothing is cut
pub fn rank_series(pool: Vec<CatalogEntry>, languages: &[String], today: NaiveDate) -> Vec<TrendingCandidate> {
    let mut ranked: Vec<TrendingCandidate> = pool
        .into_iter()
        .filter(|entry| speaks_any(entry, languages))
        .map(|entry| {
            let score = score_series(&entry, today);
            TrendingCandidate {
                entry,
                score,
                status: None,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(TRENDING_LIMIT);
    ranked
}

fn speaks_any(entry: &CatalogEntry, languages: &[String]) -> bool {
    entry
        .original_language
        .as_deref()
        .is_some_and(|lang| languages.iter().any(|l| l == lang))
}

fn from_country(entry: &CatalogEntry, country: &str) -> bool {
    entry.origin_country.iter().any(|c| c == country)
}

/// Fetches pools and applies the ranking policies for one region
#[derive(Clone)]
pub struct TrendingRanker {
    catalog: PacedCatalog,
    region: String,
    languages: Vec<String>,
}

impl TrendingRanker {
    pub fn new(catalog: PacedCatalog, region: impl Into<String>, languages: Vec<String>) -> Self {
        Self {
            catalog,
            region: region.into(),
            languages,
        }
    }

    pub async fn trending_movies(&self) -> AppResult<Vec<TrendingCandidate>> {
        self.trending_movies_on(Utc::now().date_naive()).await
    }

    pub async fn trending_series(&self) -> AppResult<Vec<TrendingCandidate>> {
        self.trending_series_on(Utc::now().date_naive()).await
    }

    /// Daily trending, upcoming and now playing, first source wins on duplicates
    ///
    /// Each source may fail on its own. Popular titles are used only when all
    /// three fail.
    #[instrument(skip(self), fields(region = %self.region))]
    pub async fn trending_movies_on(&self, today: NaiveDate) -> AppResult<Vec<TrendingCandidate>> {
        let client = self.catalog.client();
        let region = self.region.as_str();
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        let mut any_succeeded = false;

        let sources = [PoolSource::Trending, PoolSource::Upcoming, PoolSource::NowPlaying];
        for source in sources {
            let fetched = match source {
                PoolSource::Trending => {
                    self.fetch("trending_day", || client.trending(MediaType::Movie, TrendingWindow::Day))
                        .await
                }
                PoolSource::Upcoming => self.fetch("upcoming", || client.upcoming(region)).await,
                _ => self.fetch("now_playing", || client.now_playing(region)).await,
            };

            if let Some(entries) = fetched {
                any_succeeded = true;
                for entry in entries {
                    if seen.insert(entry.id) {
                        pool.push(SourcedEntry { entry, source });
                    }
                }
            }
        }

        if !any_succeeded {
            tracing::warn!("Every trending source failed, falling back to popular");
            let popular = self
                .fetch("popular", || client.popular(MediaType::Movie, region))
                .await
                .ok_or_else(|| AppError::SearchFailed("no trending movie source answered".to_string()))?;
            pool.extend(popular.into_iter().map(|entry| SourcedEntry {
                entry,
                source: PoolSource::Popular,
            }));
        }

        let pooled = pool.len();
        let ranked = rank_movies(pool, &self.languages, today);
        tracing::info!(pooled, returned = ranked.len(), "Trending movies ranked");
        Ok(ranked)
    }

    /// Origin-country discovery, then trending, then popular
    ///
    /// Each fallback runs only when the previous source failed.
    #[instrument(skip(self), fields(region = %self.region))]
    pub async fn trending_series_on(&self, today: NaiveDate) -> AppResult<Vec<TrendingCandidate>> {
        let client = self.catalog.client();
        let region = self.region.as_str();

        let filters = DiscoverFilters::sorted_by(SortOrder::PopularityDesc)
            .with_origin_country(region)
            .with_min_votes(TV_DISCOVER_MIN_VOTES)
            .with_date(Some(DateConstraint::Range {
                gte: today.checked_sub_signed(Duration::days(365 * TV_LOOKBACK_YEARS as i64)),
                lte: None,
            }));

        let pool = if let Some(shows) = self
            .fetch("tv_discover", || client.discover(MediaType::Series, &filters))
            .await
        {
            shows
        } else if let Some(shows) = self
            .fetch("tv_trending", || client.trending(MediaType::Series, TrendingWindow::Week))
            .await
        {
            shows.into_iter().filter(|s| from_country(s, region)).collect()
        } else if let Some(shows) = self
            .fetch("tv_popular", || client.popular(MediaType::Series, region))
            .await
        {
            shows.into_iter().filter(|s| from_country(s, region)).collect()
        } else {
            return Err(AppError::SearchFailed("no trending series source answered".to_string()));
        };

        let pooled = pool.len();
        let ranked = rank_series(pool, &self.languages, today);
        tracing::info!(pooled, returned = ranked.len(), "Trending series ranked");
        Ok(ranked)
    }

    async fn fetch<F, Fut>(&self, label: &str, operation: F) -> Option<Vec<CatalogEntry>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<Vec<CatalogEntry>>>,
    {
        match self.catalog.call(label, operation).await {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(source = label, error = %e, "Trending source failed");
                None
            }
        }
    }
}
