//! Raw TMDB payloads and their normalization into [`CatalogEntry`].

use chrono::NaiveDate;
use serde::Deserialize;

use super::{CatalogEntry, MediaType};

/// Number of billed cast members kept for similarity scoring
const CAST_LIMIT: usize = 10;

/// One page of a list endpoint (discover, search, trending, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Item of a list endpoint; movies use `title`/`release_date`, shows use
/// `name`/`first_air_date`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbListItem {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
}

impl TmdbListItem {
    pub fn into_entry(self, media_type: MediaType) -> CatalogEntry {
        CatalogEntry {
            id: self.id,
            title: self.title.or(self.name).unwrap_or_default(),
            media_type,
            overview: self.overview,
            genre_ids: self.genre_ids.into_iter().collect(),
            keywords: Default::default(),
            cast_ids: Default::default(),
            rating: self.vote_average,
            vote_count: self.vote_count,
            popularity: self.popularity,
            release_date: parse_date(self.release_date.or(self.first_air_date)),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            original_language: self.original_language,
            origin_country: self.origin_country,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbKeyword {
    pub name: String,
}

/// Movies nest keywords under `keywords`, shows under `results`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbKeywords {
    #[serde(default)]
    pub keywords: Vec<TmdbKeyword>,
    #[serde(default)]
    pub results: Vec<TmdbKeyword>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastMember {
    pub id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
}

/// `GET /{movie|tv}/{id}?append_to_response=credits,keywords`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbDetails {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub keywords: Option<TmdbKeywords>,
}

impl TmdbDetails {
    pub fn into_entry(self, media_type: MediaType) -> CatalogEntry {
        let keywords = self
            .keywords
            .map(|k| if k.keywords.is_empty() { k.results } else { k.keywords })
            .unwrap_or_default();

        let cast_ids = self
            .credits
            .map(|c| c.cast.into_iter().take(CAST_LIMIT).map(|m| m.id).collect())
            .unwrap_or_default();

        CatalogEntry {
            id: self.id,
            title: self.title.or(self.name).unwrap_or_default(),
            media_type,
            overview: self.overview,
            genre_ids: self.genres.into_iter().map(|g| g.id).collect(),
            keywords: keywords.into_iter().map(|k| k.name.to_lowercase()).collect(),
            cast_ids,
            rating: self.vote_average,
            vote_count: self.vote_count,
            popularity: self.popularity,
            release_date: parse_date(self.release_date.or(self.first_air_date)),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            original_language: self.original_language,
            origin_country: self.origin_country,
        }
    }
}

/// TMDB sends `""` for unknown dates
fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_list_item_normalization() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "overview": "A thief who steals corporate secrets",
            "genre_ids": [28, 878, 12],
            "vote_average": 8.4,
            "vote_count": 35000,
            "popularity": 120.5,
            "release_date": "2010-07-15",
            "poster_path": "/inception.jpg",
            "original_language": "en"
        }"#;

        let item: TmdbListItem = serde_json::from_str(json).unwrap();
        let entry = item.into_entry(MediaType::Movie);

        assert_eq!(entry.id, 27205);
        assert_eq!(entry.title, "Inception");
        assert_eq!(entry.genre_ids.len(), 3);
        assert_eq!(entry.release_date, NaiveDate::from_ymd_opt(2010, 7, 15));
        assert_eq!(entry.poster_path.as_deref(), Some("/inception.jpg"));
    }

    #[test]
    fn test_tv_list_item_uses_name_and_first_air_date() {
        let json = r#"{
            "id": 1396,
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "origin_country": ["US"]
        }"#;

        let item: TmdbListItem = serde_json::from_str(json).unwrap();
        let entry = item.into_entry(MediaType::Series);

        assert_eq!(entry.title, "Breaking Bad");
        assert_eq!(entry.release_date, NaiveDate::from_ymd_opt(2008, 1, 20));
        assert_eq!(entry.origin_country, vec!["US"]);
    }

    #[test]
    fn test_empty_release_date_is_none() {
        let json = r#"{ "id": 1, "title": "Untitled", "release_date": "" }"#;
        let item: TmdbListItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.into_entry(MediaType::Movie).release_date, None);
    }

    #[test]
    fn test_movie_details_keywords_and_cast() {
        let json = r#"{
            "id": 603,
            "title": "The Matrix",
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
            "vote_average": 8.2,
            "credits": {"cast": [{"id": 1}, {"id": 2}, {"id": 3}]},
            "keywords": {"keywords": [{"name": "Cyberpunk"}, {"name": "Dystopia"}]}
        }"#;

        let details: TmdbDetails = serde_json::from_str(json).unwrap();
        let entry = details.into_entry(MediaType::Movie);

        assert!(entry.genre_ids.contains(&878));
        assert!(entry.keywords.contains("cyberpunk"));
        assert_eq!(entry.cast_ids.len(), 3);
    }

    #[test]
    fn test_tv_details_keywords_under_results() {
        let json = r#"{
            "id": 66732,
            "name": "Stranger Things",
            "keywords": {"results": [{"name": "Supernatural"}]}
        }"#;

        let details: TmdbDetails = serde_json::from_str(json).unwrap();
        let entry = details.into_entry(MediaType::Series);
        assert!(entry.keywords.contains("supernatural"));
    }

    #[test]
    fn test_cast_is_capped() {
        let cast: Vec<String> = (1..=15).map(|i| format!(r#"{{"id": {}}}"#, i)).collect();
        let json = format!(r#"{{"id": 9, "title": "Ensemble", "credits": {{"cast": [{}]}}}}"#, cast.join(","));
        let details: TmdbDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(details.into_entry(MediaType::Movie).cast_ids.len(), CAST_LIMIT);
    }
}
