pub mod catalog;
pub mod ranking;
pub mod tmdb;

pub use catalog::{CatalogEntry, MediaType};
pub use ranking::{
    sort_by_score_desc, Confidence, ImageMatchResult, RankedList, ScoreScale, ScoredCandidate,
    TrendingCandidate, TrendingStatus,
};
