//! Case- and accent-insensitive vessel name matching.
//!
//! Similarity follows the trigram model of PostgreSQL's `pg_trgm`: each word
//! is padded with two leading spaces and one trailing space and split into
//! three-character windows; similarity is the Jaccard index of the two
//! trigram sets.

use std::collections::BTreeSet;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Minimum trigram similarity for a non-substring hit.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

/// Default number of hits returned by a name search.
pub const DEFAULT_LIMIT: usize = 20;

/// Lowercase, strip accents, and collapse runs of whitespace.
pub fn fold(s: &str) -> String {
  s.nfd()
    .filter(|c| !is_combining_mark(*c))
    .flat_map(char::to_lowercase)
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

/// The trigram set of an already-folded string.
pub fn trigrams(folded: &str) -> BTreeSet<String> {
  folded
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .flat_map(|word| {
      let padded: Vec<char> = "  ".chars().chain(word.chars()).chain(" ".chars()).collect();
      padded
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect::<Vec<_>>()
    })
    .collect()
}

/// Jaccard similarity of the trigram sets of two folded strings.
pub fn similarity(a: &str, b: &str) -> f64 {
  let (ta, tb) = (trigrams(a), trigrams(b));
  if ta.is_empty() || tb.is_empty() {
    return 0.0;
  }
  let shared = ta.intersection(&tb).count();
  let union = ta.len() + tb.len() - shared;
  shared as f64 / union as f64
}

/// Score `name` against a folded query. `None` when it does not match.
///
/// Substring hits score `1 + similarity` so they always outrank fuzzy hits.
pub fn score(folded_query: &str, name: &str) -> Option<f64> {
  if folded_query.is_empty() {
    return None;
  }
  let folded_name = fold(name);
  let sim = similarity(folded_query, &folded_name);
  if folded_name.contains(folded_query) {
    Some(1.0 + sim)
  } else if sim >= SIMILARITY_THRESHOLD {
    Some(sim)
  } else {
    None
  }
}
