use serde::{Deserialize, Serialize};

use super::CatalogEntry;

/// Scale a ranked list's scores are expressed on
///
/// Engines do not share a scale, so every ranked response names its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScoreScale {
    /// Unbounded additive points (keyword text search)
    Additive,
    /// 0-100 (perceptual / color matching)
    Percent,
    /// 0-1 (similarity and cosine scores)
    Unit,
}

/// A catalog entry with an engine-specific match score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub match_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_matches: Option<u32>,
}

impl ScoredCandidate {
    pub fn new(entry: CatalogEntry, match_score: f64) -> Self {
        Self {
            entry,
            match_score,
            hash_similarity: None,
            color_similarity: None,
            frame_matches: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.entry.id
    }
}

/// Ordered engine output together with the scale its scores use
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedList {
    pub score_scale: ScoreScale,
    pub results: Vec<ScoredCandidate>,
}

impl RankedList {
    pub fn new(score_scale: ScoreScale, results: Vec<ScoredCandidate>) -> Self {
        Self {
            score_scale,
            results,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Sorts descending by score; ties keep their pool order
pub fn sort_by_score_desc(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Outcome of matching an image (or a set of frames) against the poster corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMatchResult {
    pub identified: bool,
    pub confidence: Confidence,
    pub identified_movie: Option<ScoredCandidate>,
    pub alternative_results: Vec<ScoredCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_analyzed: Option<usize>,
}

impl ImageMatchResult {
    pub fn empty() -> Self {
        Self {
            identified: false,
            confidence: Confidence::Low,
            identified_movie: None,
            alternative_results: Vec::new(),
            frames_analyzed: None,
        }
    }

    /// Promotes the top of an already sorted list when it clears `threshold`
    pub fn from_ranked(
        mut ranked: Vec<ScoredCandidate>,
        threshold: f64,
        high_threshold: f64,
    ) -> Self {
        let top_score = ranked.first().map(|c| c.match_score);

        match top_score {
            Some(score) if score > threshold => {
                let top = ranked.remove(0);
                Self {
                    identified: true,
                    confidence: if score > high_threshold {
                        Confidence::High
                    } else {
                        Confidence::Medium
                    },
                    identified_movie: Some(top),
                    alternative_results: ranked,
                    frames_analyzed: None,
                }
            }
            _ => Self {
                alternative_results: ranked,
                ..Self::empty()
            },
        }
    }
}

/// Buzz category of a trending entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendingStatus {
    Upcoming,
    Fresh,
    ViralOld,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingCandidate {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub score: f64,
    /// Only the movie policy classifies entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TrendingStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn candidate(id: u64, score: f64) -> ScoredCandidate {
        ScoredCandidate::new(CatalogEntry::new(id, format!("Movie {}", id), MediaType::Movie), score)
    }

    #[test]
    fn test_sort_by_score_desc() {
        let mut list = vec![candidate(1, 10.0), candidate(2, 90.0), candidate(3, 50.0)];
        sort_by_score_desc(&mut list);
        let ids: Vec<u64> = list.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_from_ranked_promotes_high_confidence() {
        let result = ImageMatchResult::from_ranked(vec![candidate(1, 85.0), candidate(2, 40.0)], 65.0, 80.0);
        assert!(result.identified);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.identified_movie.unwrap().id(), 1);
        assert_eq!(result.alternative_results.len(), 1);
    }

    #[test]
    fn test_from_ranked_medium_confidence() {
        let result = ImageMatchResult::from_ranked(vec![candidate(1, 70.0)], 65.0, 80.0);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_from_ranked_below_threshold_keeps_everything_as_alternatives() {
        let result = ImageMatchResult::from_ranked(vec![candidate(1, 65.0), candidate(2, 30.0)], 65.0, 80.0);
        assert!(!result.identified);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.identified_movie.is_none());
        assert_eq!(result.alternative_results.len(), 2);
    }

    #[test]
    fn test_trending_status_serialization() {
        assert_eq!(serde_json::to_string(&TrendingStatus::ViralOld).unwrap(), "\"viral_old\"");
    }

    #[test]
    fn test_scored_candidate_flattens_entry() {
        let json = serde_json::to_value(candidate(7, 1.5)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["match_score"], 1.5);
        assert!(json.get("frame_matches").is_none());
    }
}
