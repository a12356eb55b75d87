/// TMDB catalog client
///
/// One HTTP request per trait call, each with a timeout chosen by call kind.
/// Raw payloads are normalized into `CatalogEntry` through `models::tmdb`.
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        tmdb::{TmdbDetails, TmdbListItem, TmdbPage},
        CatalogEntry, MediaType,
    },
    services::catalog::{CatalogClient, DateConstraint, DiscoverFilters, TrendingWindow},
};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const TRENDING_TIMEOUT: Duration = Duration::from_secs(15);
const TV_DISCOVER_TIMEOUT: Duration = Duration::from_secs(20);

type QueryParams = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_url: String,
}

impl TmdbClient {
    pub fn new(api_key: String, api_url: String, image_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_url: image_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tmdb_api_key.clone(),
            config.tmdb_api_url.clone(),
            config.tmdb_image_url.clone(),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        timeout: Duration,
    ) -> AppResult<T> {
        let response = self
            .http_client
            .get(self.endpoint(path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .timeout(timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("TMDB resource {}", path)));
        }

        let response = response.error_for_status()?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, path = %path, "Failed to deserialize TMDB response");
            AppError::ExternalApi(format!("Failed to parse TMDB response: {}", e))
        })
    }

    async fn get_list(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        timeout: Duration,
        media_type: MediaType,
    ) -> AppResult<Vec<CatalogEntry>> {
        let page: TmdbPage<TmdbListItem> = self.get_json(path, params, timeout).await?;

        tracing::debug!(
            path = %path,
            results = page.results.len(),
            provider = "tmdb",
            "Catalog list fetched"
        );

        Ok(page
            .results
            .into_iter()
            .map(|item| item.into_entry(media_type))
            .collect())
    }
}

/// Query parameters of `GET /search/{movie|tv}`
fn search_params(query: &str, year: Option<i32>, media_type: MediaType) -> QueryParams {
    let mut params = vec![
        ("query", query.to_string()),
        ("include_adult", "false".to_string()),
        ("page", "1".to_string()),
    ];

    if let Some(year) = year {
        let key = if media_type.is_tv() { "first_air_date_year" } else { "year" };
        params.push((key, year.to_string()));
    }

    params
}

/// Query parameters of `GET /discover/{movie|tv}`
fn discover_params(media_type: MediaType, filters: &DiscoverFilters) -> QueryParams {
    let mut params = vec![
        ("sort_by", filters.sort_by.as_param().to_string()),
        ("page", "1".to_string()),
    ];

    if !filters.genre_ids.is_empty() {
        let genres: Vec<String> = filters.genre_ids.iter().map(|g| g.to_string()).collect();
        params.push(("with_genres", genres.join(",")));
    }

    if let Some(min_votes) = filters.min_vote_count {
        params.push(("vote_count.gte", min_votes.to_string()));
    }

    if let Some(country) = &filters.origin_country {
        params.push(("with_origin_country", country.clone()));
    }

    let tv = media_type.is_tv();
    match filters.date {
        Some(DateConstraint::Year(year)) => {
            let key = if tv { "first_air_date_year" } else { "primary_release_year" };
            params.push((key, year.to_string()));
        }
        Some(DateConstraint::Range { gte, lte }) => {
            let (gte_key, lte_key) = if tv {
                ("first_air_date.gte", "first_air_date.lte")
            } else {
                ("primary_release_date.gte", "primary_release_date.lte")
            };
            if let Some(gte) = gte {
                params.push((gte_key, gte.format("%Y-%m-%d").to_string()));
            }
            if let Some(lte) = lte {
                params.push((lte_key, lte.format("%Y-%m-%d").to_string()));
            }
        }
        None => {}
    }

    params
}

fn discover_timeout(media_type: MediaType, filters: &DiscoverFilters) -> Duration {
    if media_type.is_tv() && filters.origin_country.is_some() {
        TV_DISCOVER_TIMEOUT
    } else {
        LIST_TIMEOUT
    }
}

fn first_page() -> QueryParams {
    vec![("page", "1".to_string())]
}

fn regional_page(region: &str) -> QueryParams {
    vec![("region", region.to_string()), ("page", "1".to_string())]
}

#[async_trait::async_trait]
impl CatalogClient for TmdbClient {
    async fn search_by_title(
        &self,
        query: &str,
        year: Option<i32>,
        media_type: MediaType,
    ) -> AppResult<Vec<CatalogEntry>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Search query cannot be empty".to_string()));
        }

        let path = format!("search/{}", media_type.endpoint());
        let results = self
            .get_list(&path, &search_params(query, year, media_type), SEARCH_TIMEOUT, media_type)
            .await?;

        tracing::info!(
            query = %query,
            results = results.len(),
            provider = "tmdb",
            "Title search completed"
        );

        Ok(results)
    }

    async fn discover(
        &self,
        media_type: MediaType,
        filters: &DiscoverFilters,
    ) -> AppResult<Vec<CatalogEntry>> {
        let path = format!("discover/{}", media_type.endpoint());
        self.get_list(
            &path,
            &discover_params(media_type, filters),
            discover_timeout(media_type, filters),
            media_type,
        )
        .await
    }

    async fn get_details(&self, id: u64, media_type: MediaType) -> AppResult<CatalogEntry> {
        let path = format!("{}/{}", media_type.endpoint(), id);
        let params = vec![("append_to_response", "credits,keywords".to_string())];

        let details: TmdbDetails = self.get_json(&path, &params, LIST_TIMEOUT).await?;
        Ok(details.into_entry(media_type))
    }

    async fn similar(&self, id: u64, media_type: MediaType) -> AppResult<Vec<CatalogEntry>> {
        let path = format!("{}/{}/similar", media_type.endpoint(), id);
        self.get_list(&path, &first_page(), LIST_TIMEOUT, media_type).await
    }

    async fn recommendations(
        &self,
        id: u64,
        media_type: MediaType,
    ) -> AppResult<Vec<CatalogEntry>> {
        let path = format!("{}/{}/recommendations", media_type.endpoint(), id);
        self.get_list(&path, &first_page(), LIST_TIMEOUT, media_type).await
    }

    async fn trending(
        &self,
        media_type: MediaType,
        window: TrendingWindow,
    ) -> AppResult<Vec<CatalogEntry>> {
        let path = format!("trending/{}/{}", media_type.endpoint(), window.as_path());
        self.get_list(&path, &[], TRENDING_TIMEOUT, media_type).await
    }

    async fn upcoming(&self, region: &str) -> AppResult<Vec<CatalogEntry>> {
        self.get_list("movie/upcoming", &regional_page(region), TRENDING_TIMEOUT, MediaType::Movie)
            .await
    }

    async fn now_playing(&self, region: &str) -> AppResult<Vec<CatalogEntry>> {
        self.get_list("movie/now_playing", &regional_page(region), TRENDING_TIMEOUT, MediaType::Movie)
            .await
    }

    async fn popular(&self, media_type: MediaType, region: &str) -> AppResult<Vec<CatalogEntry>> {
        let path = format!("{}/popular", media_type.endpoint());
        let timeout = if media_type.is_tv() { TV_DISCOVER_TIMEOUT } else { TRENDING_TIMEOUT };
        self.get_list(&path, &regional_page(region), timeout, media_type).await
    }

    async fn download_image(&self, path: &str) -> AppResult<Vec<u8>> {
        let url = format!("{}/{}", self.image_url, path.trim_start_matches('/'));

        let response = self
            .http_client
            .get(&url)
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Image {}", path)));
        }

        let bytes = response.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
