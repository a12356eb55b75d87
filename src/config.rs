use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB API key
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Base URL poster paths are appended to
    #[serde(default = "default_tmdb_image_url")]
    pub tmdb_image_url: String,

    /// OpenAI API key, enables the OpenAI vision/embedding provider
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Gemini API key, enables the Gemini vision/embedding provider
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Root directory of the on-disk poster byte cache
    #[serde(default = "default_poster_cache_dir")]
    pub poster_cache_dir: PathBuf,

    /// Minimum spacing between upstream calls issued by the engines
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Region used for upcoming / now-playing lists and TV origin country
    #[serde(default = "default_trending_region")]
    pub trending_region: String,

    /// Original-language codes kept by the trending ranker
    #[serde(default = "default_trending_languages")]
    pub trending_languages: Vec<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_url() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

fn default_poster_cache_dir() -> PathBuf {
    PathBuf::from("./temp/poster_cache")
}

fn default_request_interval_ms() -> u64 {
    300
}

fn default_trending_region() -> String {
    "IN".to_string()
}

fn default_trending_languages() -> Vec<String> {
    ["hi", "ta", "te", "ml", "kn", "bn", "mr", "pa"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
