use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Kind of catalog content a request is about
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    #[serde(alias = "tv")]
    Series,
    Anime,
}

impl MediaType {
    /// Path segment the catalog uses for this kind (`movie` or `tv`)
    pub fn endpoint(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series | MediaType::Anime => "tv",
        }
    }

    pub fn is_tv(&self) -> bool {
        !matches!(self, MediaType::Movie)
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Series => write!(f, "series"),
            MediaType::Anime => write!(f, "anime"),
        }
    }
}

/// Normalized view of one movie or show returned by the catalog
///
/// Immutable for the duration of a scoring pass. Keywords are stored
/// lowercased so set operations are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: u64,
    pub title: String,
    pub media_type: MediaType,
    pub overview: Option<String>,
    pub genre_ids: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub cast_ids: BTreeSet<u64>,
    pub rating: f64,
    pub vote_count: u64,
    pub popularity: f64,
    pub release_date: Option<NaiveDate>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin_country: Vec<String>,
}

impl CatalogEntry {
    /// Minimal entry, mostly useful for building fixtures
    pub fn new(id: u64, title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id,
            title: title.into(),
            media_type,
            overview: None,
            genre_ids: BTreeSet::new(),
            keywords: BTreeSet::new(),
            cast_ids: BTreeSet::new(),
            rating: 0.0,
            vote_count: 0,
            popularity: 0.0,
            release_date: None,
            poster_path: None,
            backdrop_path: None,
            original_language: None,
            origin_country: Vec::new(),
        }
    }

    /// Entries without a synopsis are too sparse to score
    pub fn has_synopsis(&self) -> bool {
        self.overview.as_deref().is_some_and(|o| !o.trim().is_empty())
    }

    /// Lowercased `title + synopsis`, the haystack for term matching
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.overview.as_deref().unwrap_or_default()).to_lowercase()
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        self
    }
}
