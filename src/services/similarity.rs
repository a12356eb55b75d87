//! Weighted multi-factor similarity between two catalog entries
//!
//! Used by the "find similar titles" flow. Every factor is normalized to
//! `[0, 1]` and the weights sum to one, so the score is on the unit scale.

use std::collections::BTreeSet;

use crate::models::CatalogEntry;
use crate::services::taxonomy;

const GENRE_WEIGHT: f64 = 0.25;
const KEYWORD_WEIGHT: f64 = 0.25;
const CAST_WEIGHT: f64 = 0.15;
const RATING_WEIGHT: f64 = 0.15;
const VIBE_WEIGHT: f64 = 0.20;

/// Stand-in for a missing (zero) rating
const UNRATED: f64 = 6.0;

/// Highest per-label difference the vibe normalization expects
const MAX_VIBE_DIFF: f64 = 5.0;

/// Score used when one side has no vibe profile
const NEUTRAL_VIBE: f64 = 0.5;

/// Closed set of tonal labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vibe {
    Emotional,
    Wholesome,
    Dark,
    Energetic,
    Suspenseful,
    Nostalgic,
    Romantic,
    Violent,
    FamilyFriendly,
    Epic,
    Calm,
    Funny,
    Sad,
    Psychological,
}

impl Vibe {
    pub const ALL: [Vibe; 14] = [
        Vibe::Emotional,
        Vibe::Wholesome,
        Vibe::Dark,
        Vibe::Energetic,
        Vibe::Suspenseful,
        Vibe::Nostalgic,
        Vibe::Romantic,
        Vibe::Violent,
        Vibe::FamilyFriendly,
        Vibe::Epic,
        Vibe::Calm,
        Vibe::Funny,
        Vibe::Sad,
        Vibe::Psychological,
    ];

    /// Phrases that count towards this vibe
    pub fn phrases(&self) -> &'static [&'static str] {
        match self {
            Vibe::Emotional => &["emotional", "heartfelt", "touching", "moving", "passionate"],
            Vibe::Wholesome => &["wholesome", "feel-good", "uplifting", "inspiring", "heartwarming"],
            Vibe::Dark => &["dark", "gloomy", "bleak", "noir", "sinister"],
            Vibe::Energetic => &["fast-paced", "energetic", "intense", "dynamic", "thrilling"],
            Vibe::Suspenseful => &["suspenseful", "tense", "thrilling", "suspense", "mystery"],
            Vibe::Nostalgic => &["nostalgic", "retro", "vintage", "classic", "timeless"],
            Vibe::Romantic => &["romantic", "romance", "love", "passionate", "intimate"],
            Vibe::Violent => &["violent", "brutal", "gory", "action-packed", "combat"],
            Vibe::FamilyFriendly => &["family-friendly", "wholesome", "kids", "children", "animated"],
            Vibe::Epic => &["epic", "grand", "sweeping", "monumental", "legendary"],
            Vibe::Calm => &["calm", "peaceful", "serene", "meditative", "quiet"],
            Vibe::Funny => &["funny", "comedy", "humorous", "comedic", "witty"],
            Vibe::Sad => &["sad", "tragic", "melancholic", "sorrowful", "depressing"],
            Vibe::Psychological => {
                &["psychological", "mind-bending", "introspective", "cerebral", "philosophical"]
            }
        }
    }
}

/// Count of matched phrases per [`Vibe`], indexed like [`Vibe::ALL`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VibeVector([u8; 14]);

impl VibeVector {
    /// A phrase scores when it occurs inside any keyword or genre name
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        let genre_names: Vec<String> = entry
            .genre_ids
            .iter()
            .filter_map(|id| taxonomy::genre_name(*id))
            .map(str::to_lowercase)
            .collect();

        let mut counts = [0u8; 14];
        for (slot, vibe) in counts.iter_mut().zip(Vibe::ALL) {
            *slot = vibe
                .phrases()
                .iter()
                .filter(|phrase| {
                    entry.keywords.iter().any(|k| k.contains(*phrase))
                        || genre_names.iter().any(|g| g.contains(*phrase))
                })
                .count() as u8;
        }

        Self(counts)
    }

    pub fn get(&self, vibe: Vibe) -> u8 {
        let index = Vibe::ALL.iter().position(|v| *v == vibe).unwrap_or_default();
        self.0[index]
    }

    /// `1 - Σ|Δ| / (labels × 5)`, clamped to `[0, 1]`
    pub fn similarity(&self, other: &Self) -> f64 {
        let total: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.abs_diff(*b) as u32)
            .sum();

        (1.0 - total as f64 / (self.0.len() as f64 * MAX_VIBE_DIFF)).clamp(0.0, 1.0)
    }
}

/// Shared-element ratio `|a ∩ b| / max(|a|, |b|)`
///
/// Two empty sets overlap fully, so an entry always matches itself.
fn overlap<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.len().max(b.len()).max(1) as f64
}

fn effective_rating(rating: f64) -> f64 {
    if rating > 0.0 {
        rating
    } else {
        UNRATED
    }
}

/// Similarity of `candidate` to `primary` in `[0, 1]`
///
/// A missing vibe profile on either side scores the neutral 0.5 for that
/// factor.
pub fn score(
    primary: &CatalogEntry,
    candidate: &CatalogEntry,
    primary_vibes: Option<&VibeVector>,
    candidate_vibes: Option<&VibeVector>,
) -> f64 {
    let genre = overlap(&primary.genre_ids, &candidate.genre_ids);
    let keyword = overlap(&primary.keywords, &candidate.keywords);
    let cast = overlap(&primary.cast_ids, &candidate.cast_ids);

    let rating_diff =
        (effective_rating(primary.rating) - effective_rating(candidate.rating)).abs() / 10.0;
    let rating = 1.0 - rating_diff;

    let vibe = match (primary_vibes, candidate_vibes) {
        (Some(a), Some(b)) => a.similarity(b),
        _ => NEUTRAL_VIBE,
    };

    genre * GENRE_WEIGHT
        + keyword * KEYWORD_WEIGHT
        + cast * CAST_WEIGHT
        + rating * RATING_WEIGHT
        + vibe * VIBE_WEIGHT
}
