//! Poster-corpus matching for uploaded images and video frames
//!
//! The corpus is the first page of popular titles. Each poster is read
//! through the poster store, fingerprinted and compared with the query.
//! Fingerprints are recomputed for every request; only poster bytes persist.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    cache::{PosterKey, PosterStore},
    error::{AppError, AppResult},
    models::{sort_by_score_desc, CatalogEntry, ImageMatchResult, MediaType, ScoredCandidate},
    read_through_poster,
    services::{
        catalog::{DiscoverFilters, SortOrder},
        fingerprint::ImageFingerprint,
        PacedCatalog,
    },
};

/// Posters compared per request
pub const CORPUS_SIZE: usize = 15;
const CORPUS_MIN_VOTES: u64 = 100;

/// Combined scores at or below this are noise
const NOISE_FLOOR: f64 = 25.0;

const IMAGE_IDENTIFIED: f64 = 65.0;
const IMAGE_HIGH_CONFIDENCE: f64 = 80.0;
const VIDEO_IDENTIFIED: f64 = 60.0;
const VIDEO_HIGH_CONFIDENCE: f64 = 75.0;

/// Weight of a frame hit that was not the frame's top match
const ALTERNATIVE_FRAME_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub media_type: MediaType,
    pub limit: usize,
    /// Dropped after scoring, typically a title the AI already named
    pub exclude_id: Option<u64>,
}

impl MatchOptions {
    pub fn new(media_type: MediaType, limit: usize) -> Self {
        Self {
            media_type,
            limit,
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, exclude_id: Option<u64>) -> Self {
        self.exclude_id = exclude_id;
        self
    }
}

/// A corpus entry with its poster fingerprint
#[derive(Debug, Clone)]
pub struct CorpusPoster {
    pub entry: CatalogEntry,
    pub fingerprint: ImageFingerprint,
}

#[derive(Clone)]
pub struct ImageMatchEngine {
    catalog: PacedCatalog,
    posters: Arc<dyn PosterStore>,
}

impl ImageMatchEngine {
    pub fn new(catalog: PacedCatalog, posters: Arc<dyn PosterStore>) -> Self {
        Self { catalog, posters }
    }

    #[instrument(skip(self, image), fields(bytes = image.len(), media_type = %options.media_type))]
    pub async fn match_image(&self, image: &[u8], options: &MatchOptions) -> AppResult<ImageMatchResult> {
        let query = fingerprint_off_thread(image.to_vec(), true).await?;
        let corpus = self.load_corpus(options.media_type).await?;
        let result = rank_against_corpus(&query, &corpus, options);

        tracing::info!(
            identified = result.identified,
            alternatives = result.alternative_results.len(),
            "Image match completed"
        );
        Ok(result)
    }

    /// Matches every frame, then averages each title over the frames it appeared in
    ///
    /// Undecodable frames are skipped. The corpus is loaded once and shared by
    /// all frames.
    #[instrument(skip(self, frames), fields(frames = frames.len(), media_type = %options.media_type))]
    pub async fn match_video(&self, frames: &[Vec<u8>], options: &MatchOptions) -> AppResult<ImageMatchResult> {
        if frames.is_empty() {
            return Err(AppError::InvalidInput("No video frames provided".to_string()));
        }

        let corpus = self.load_corpus(options.media_type).await?;
        let mut tally = FrameTally::default();
        let mut analyzed = 0usize;

        for (index, frame) in frames.iter().enumerate() {
            let query = match fingerprint_off_thread(frame.clone(), true).await {
                Ok(query) => query,
                Err(e) => {
                    tracing::warn!(frame = index, error = %e, "Skipping undecodable frame");
                    continue;
                }
            };
            analyzed += 1;

            let frame_result = rank_against_corpus(&query, &corpus, options);
            if let Some(top) = frame_result.identified_movie {
                tally.add(top, 1.0);
            }
            for alternative in frame_result.alternative_results {
                tally.add(alternative, ALTERNATIVE_FRAME_WEIGHT);
            }
        }

        if analyzed == 0 {
            return Err(AppError::InvalidInput("None of the frames could be decoded".to_string()));
        }

        let mut ranked = tally.into_candidates();
        sort_by_score_desc(&mut ranked);
        ranked.truncate(options.limit);

        let mut result = ImageMatchResult::from_ranked(ranked, VIDEO_IDENTIFIED, VIDEO_HIGH_CONFIDENCE);
        result.frames_analyzed = Some(analyzed);

        tracing::info!(
            analyzed,
            identified = result.identified,
            alternatives = result.alternative_results.len(),
            "Video match completed"
        );
        Ok(result)
    }

    /// Popular titles with a fingerprinted poster
    ///
    /// Candidates without a poster, or whose poster cannot be fetched or
    /// decoded, are left out.
    async fn load_corpus(&self, media_type: MediaType) -> AppResult<Vec<CorpusPoster>> {
        let client = self.catalog.client();
        let filters =
            DiscoverFilters::sorted_by(SortOrder::PopularityDesc).with_min_votes(CORPUS_MIN_VOTES);

        let candidates = self
            .catalog
            .call("poster_corpus", || client.discover(media_type, &filters))
            .await
            .map_err(|e| AppError::SearchFailed(format!("could not load poster corpus: {}", e)))?;

        let mut corpus = Vec::with_capacity(CORPUS_SIZE);
        for entry in candidates.into_iter().take(CORPUS_SIZE) {
            let Some(path) = entry.poster_path.clone() else {
                tracing::debug!(id = entry.id, "Skipping candidate without poster");
                continue;
            };

            match self.poster_fingerprint(&entry, &path).await {
                Ok(fingerprint) => corpus.push(CorpusPoster { entry, fingerprint }),
                Err(e) => tracing::debug!(id = entry.id, error = %e, "Skipping unusable poster"),
            }
        }

        tracing::debug!(posters = corpus.len(), "Poster corpus loaded");
        Ok(corpus)
    }

    async fn poster_fingerprint(&self, entry: &CatalogEntry, path: &str) -> AppResult<ImageFingerprint> {
        let key = PosterKey::new(entry.media_type, entry.id);
        let client = self.catalog.client();

        let bytes = read_through_poster!(self.posters, key, async {
            self.catalog
                .call("poster_download", || client.download_image(path))
                .await
        })?;

        fingerprint_off_thread(bytes, false).await
    }
}

/// Running per-title totals across video frames
#[derive(Default)]
struct FrameTally {
    order: Vec<u64>,
    totals: HashMap<u64, (ScoredCandidate, f64, u32)>,
}

impl FrameTally {
    fn add(&mut self, candidate: ScoredCandidate, weight: f64) {
        let contribution = candidate.match_score * weight;
        match self.totals.get_mut(&candidate.id()) {
            Some((_, total, count)) => {
                *total += contribution;
                *count += 1;
            }
            None => {
                self.order.push(candidate.id());
                self.totals.insert(candidate.id(), (candidate, contribution, 1));
            }
        }
    }

    fn into_candidates(mut self) -> Vec<ScoredCandidate> {
        self.order
            .iter()
            .filter_map(|id| self.totals.remove(id))
            .map(|(mut candidate, total, count)| {
                candidate.match_score = total / count as f64;
                candidate.frame_matches = Some(count);
                candidate.hash_similarity = None;
                candidate.color_similarity = None;
                candidate
            })
            .collect()
    }
}

/// Scores `query` against every poster and promotes a confident top match
pub fn rank_against_corpus(
    query: &ImageFingerprint,
    corpus: &[CorpusPoster],
    options: &MatchOptions,
) -> ImageMatchResult {
    let mut ranked: Vec<ScoredCandidate> = corpus
        .iter()
        .filter_map(|poster| {
            let scores = query.compare(&poster.fingerprint);
            if scores.combined <= NOISE_FLOOR {
                return None;
            }
            let mut candidate = ScoredCandidate::new(poster.entry.clone(), scores.combined);
            candidate.hash_similarity = Some(scores.hash_similarity);
            candidate.color_similarity = Some(scores.color_similarity);
            Some(candidate)
        })
        .filter(|candidate| Some(candidate.id()) != options.exclude_id)
        .collect();

    sort_by_score_desc(&mut ranked);
    ranked.truncate(options.limit);

    ImageMatchResult::from_ranked(ranked, IMAGE_IDENTIFIED, IMAGE_HIGH_CONFIDENCE)
}

/// Decoding and hashing are CPU bound, so they run on the blocking pool
async fn fingerprint_off_thread(bytes: Vec<u8>, is_query: bool) -> AppResult<ImageFingerprint> {
    tokio::task::spawn_blocking(move || {
        if is_query {
            ImageFingerprint::from_query_bytes(&bytes)
        } else {
            ImageFingerprint::from_bytes(&bytes)
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("Fingerprint task failed: {}", e)))?
}
