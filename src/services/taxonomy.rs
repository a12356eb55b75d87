//! Free text to catalog taxonomy
//!
//! Maps descriptions such as "dark rainy cyberpunk city from the 80s" onto
//! TMDB genre ids, a handful of salient terms and an optional release-date
//! constraint. Matching is plain lowercase substring presence.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::services::catalog::DateConstraint;

/// Number of salient terms kept per description
pub const MAX_TERMS: usize = 10;

/// Mood and atmosphere words
pub const MOOD_TO_GENRES: &[(&str, &[u32])] = &[
    // Emotional moods
    ("happy", &[35, 10751, 10749]),
    ("sad", &[18, 10749]),
    ("scared", &[27, 53]),
    ("excited", &[28, 12, 878]),
    ("relaxed", &[10751, 16, 35]),
    ("tense", &[53, 80, 9648]),
    ("romantic", &[10749, 35, 18]),
    ("nostalgic", &[18, 36, 10751]),
    ("inspired", &[18, 36, 10752]),
    ("adventurous", &[12, 28, 14]),
    // Atmosphere
    ("dark", &[27, 53, 80]),
    ("light", &[35, 10751, 16]),
    ("mysterious", &[9648, 53, 878]),
    ("epic", &[12, 14, 10752]),
    ("intense", &[28, 53, 18]),
    ("funny", &[35]),
    ("dramatic", &[18]),
    ("thrilling", &[53, 28, 80]),
    ("magical", &[14, 16, 10751]),
    ("gritty", &[80, 53, 18]),
    // Themes
    ("crime", &[80, 53]),
    ("war", &[10752, 36]),
    ("space", &[878, 12]),
    ("fantasy", &[14, 12]),
    ("horror", &[27]),
    ("action", &[28, 12]),
    ("family", &[10751, 16, 35]),
    ("psychological", &[53, 18, 9648]),
    ("superhero", &[28, 12, 14]),
    ("western", &[37]),
    ("historical", &[36, 10752]),
    ("documentary", &[99]),
    ("music", &[10402]),
    ("animation", &[16]),
];

/// Concrete subjects that imply genres
pub const KEYWORD_HINTS: &[(&str, &[u32])] = &[
    ("zombie", &[27, 53]),
    ("vampire", &[27, 14]),
    ("detective", &[9648, 80, 53]),
    ("heist", &[80, 53, 28]),
    ("spy", &[28, 53, 12]),
    ("alien", &[878, 27, 12]),
    ("robot", &[878, 28]),
    ("time travel", &[878, 12, 14]),
    ("dystopian", &[878, 18, 53]),
    ("cyberpunk", &[878, 28, 53]),
    ("medieval", &[14, 12, 36]),
    ("pirate", &[12, 28, 14]),
    ("monster", &[27, 878, 28]),
    ("ghost", &[27, 9648]),
    ("serial killer", &[53, 80, 27]),
    ("apocalypse", &[878, 28, 18]),
    ("survival", &[28, 53, 18]),
    ("revenge", &[28, 53, 18]),
    ("coming of age", &[18, 35, 10749]),
    ("sports", &[18]),
    ("martial arts", &[28]),
    ("mafia", &[80, 18]),
    ("prison", &[18, 53, 80]),
    ("school", &[18, 35, 10749]),
    ("college", &[35, 18, 10749]),
];

/// TMDB movie and TV genre names, used to read tone from genre ids
const GENRE_NAMES: &[(u32, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
    (10759, "Action & Adventure"),
    (10762, "Kids"),
    (10763, "News"),
    (10764, "Reality"),
    (10765, "Sci-Fi & Fantasy"),
    (10766, "Soap"),
    (10767, "Talk"),
    (10768, "War & Politics"),
];

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can", "could", "did",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has",
    "have", "having", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "into", "its", "itself", "just", "like", "more", "most", "myself", "nor", "not", "now",
    "off", "once", "only", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
    "she", "should", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "too",
    "under", "until", "very", "was", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static EIGHTIES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(80s|eighties)\b").unwrap());
static NINETIES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(90s|nineties)\b").unwrap());
static NOUGHTIES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b2000s\b").unwrap());
static CLASSIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(classic|old|vintage)\b").unwrap());
static RECENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(recent|new|latest|modern)\b").unwrap());

/// Result of mapping one description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyMatch {
    /// Genre ids in table order, without duplicates
    pub genre_ids: Vec<u32>,
    /// Most frequent salient terms, most frequent first
    pub terms: Vec<String>,
    pub date: Option<DateConstraint>,
}

impl TaxonomyMatch {
    pub fn is_empty(&self) -> bool {
        self.genre_ids.is_empty() && self.terms.is_empty() && self.date.is_none()
    }
}

/// Maps a description, resolving relative dates against `today`
pub fn map_to_taxonomy(text: &str, today: NaiveDate) -> TaxonomyMatch {
    TaxonomyMatch {
        genre_ids: genre_ids(text),
        terms: salient_terms(text),
        date: date_constraint(text, today),
    }
}

/// Genre ids of every mood / keyword trigger occurring in `text`
pub fn genre_ids(text: &str) -> Vec<u32> {
    let lower = text.to_lowercase();
    let mut ids: Vec<u32> = Vec::new();

    for (trigger, genres) in MOOD_TO_GENRES.iter().chain(KEYWORD_HINTS) {
        if lower.contains(trigger) {
            for id in genres.iter() {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
    }

    ids
}

/// Up to [`MAX_TERMS`] terms ranked by in-document frequency
///
/// Stopwords and terms of two characters or fewer are dropped. Equal counts
/// keep first-occurrence order.
pub fn salient_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

    for (position, token) in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2 && !STOPWORDS.contains(t))
        .enumerate()
    {
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
        count_b.cmp(count_a).then(first_a.cmp(first_b))
    });

    ranked
        .into_iter()
        .take(MAX_TERMS)
        .map(|(term, _)| term.to_string())
        .collect()
}

/// At most one date constraint; an explicit year wins over decades, decades
/// over relative words
pub fn date_constraint(text: &str, today: NaiveDate) -> Option<DateConstraint> {
    if let Some(year) = YEAR
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
    {
        return Some(DateConstraint::Year(year));
    }

    let decade = |start: i32| DateConstraint::Range {
        gte: NaiveDate::from_ymd_opt(start, 1, 1),
        lte: NaiveDate::from_ymd_opt(start + 9, 12, 31),
    };

    if EIGHTIES.is_match(text) {
        return Some(decade(1980));
    }
    if NINETIES.is_match(text) {
        return Some(decade(1990));
    }
    if NOUGHTIES.is_match(text) {
        return Some(decade(2000));
    }
    if CLASSIC.is_match(text) {
        return Some(DateConstraint::Range {
            gte: None,
            lte: NaiveDate::from_ymd_opt(1990, 12, 31),
        });
    }
    if RECENT.is_match(text) {
        return Some(DateConstraint::Range {
            gte: NaiveDate::from_ymd_opt(today.year() - 3, 1, 1),
            lte: None,
        });
    }

    None
}

/// Display name of a genre id, if it is a known TMDB genre
pub fn genre_name(id: u32) -> Option<&'static str> {
    GENRE_NAMES
        .iter()
        .find(|(genre, _)| *genre == id)
        .map(|(_, name)| *name)
}
