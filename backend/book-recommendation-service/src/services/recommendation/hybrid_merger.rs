// ============================================
// Hybrid Scorer / Merger
// ============================================
//
// Pure merge steps over already-fetched candidate lists:
// - weighted: rank-decayed scores accumulated across seeds and methods
// - round robin: per-seed interleave, then one pick per seed per round
// - user picks: bounded, de-duplicated collection for user recommendations

use crate::config::MergeWeights;
use std::collections::{HashMap, HashSet};

/// Neighbour ISBNs fetched for one seed, self excluded, nearest first
#[derive(Debug, Clone, Default)]
pub struct SeedCandidates {
    pub collaborative: Vec<String>,
    pub content: Vec<String>,
}

/// Accumulated weighted scores, highest first; equal scores keep first-seen order.
///
/// Rank is the position in the fetched list, so candidates dropped by
/// `in_catalog` still consume a rank.
pub fn weighted_scores(
    seeds: &[SeedCandidates],
    weights: &MergeWeights,
    in_catalog: impl Fn(&str) -> bool,
) -> Vec<(String, f64)> {
    let mut order: Vec<&str> = Vec::new();
    let mut scores: HashMap<&str, f64> = HashMap::new();

    for seed in seeds {
        let lists = [
            (
                &seed.collaborative,
                weights.collaborative_base,
                weights.collaborative_decay,
            ),
            (&seed.content, weights.content_base, weights.content_decay),
        ];
        for (candidates, base, decay) in lists {
            for (rank, isbn) in candidates.iter().enumerate() {
                if !in_catalog(isbn) {
                    continue;
                }
                let contribution = base - decay * rank as f64;
                match scores.get_mut(isbn.as_str()) {
                    Some(score) => *score += weights.repeat_bonus * contribution,
                    None => {
                        scores.insert(isbn.as_str(), contribution);
                        order.push(isbn.as_str());
                    }
                }
            }
        }
    }

    let mut ranked: Vec<(String, f64)> = order
        .into_iter()
        .map(|isbn| (isbn.to_string(), scores[isbn]))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Top `limit` ISBNs of [`weighted_scores`]
pub fn weighted_merge(
    seeds: &[SeedCandidates],
    weights: &MergeWeights,
    in_catalog: impl Fn(&str) -> bool,
    limit: usize,
) -> Vec<String> {
    weighted_scores(seeds, weights, in_catalog)
        .into_iter()
        .take(limit)
        .map(|(isbn, _)| isbn)
        .collect()
}

/// Round-robin merge across seeds
pub fn round_robin_merge(
    seeds: &[SeedCandidates],
    in_catalog: impl Fn(&str) -> bool,
    limit: usize,
) -> Vec<String> {
    let per_seed: Vec<Vec<&str>> = seeds
        .iter()
        .map(|seed| {
            let len = seed.collaborative.len().max(seed.content.len());
            let mut interleaved = Vec::with_capacity(seed.collaborative.len() + seed.content.len());
            for i in 0..len {
                for list in [&seed.collaborative, &seed.content] {
                    if let Some(isbn) = list.get(i) {
                        if in_catalog(isbn) {
                            interleaved.push(isbn.as_str());
                        }
                    }
                }
            }
            interleaved
        })
        .collect();

    let rounds = per_seed.iter().map(Vec::len).max().unwrap_or(0);
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    'rounds: for round in 0..rounds {
        for list in &per_seed {
            if merged.len() >= limit {
                break 'rounds;
            }
            if let Some(&isbn) = list.get(round) {
                if seen.insert(isbn) {
                    merged.push(isbn.to_string());
                }
            }
        }
    }
    merged
}

/// Collects user recommendations, skipping already rated and already picked books
#[derive(Debug)]
pub struct UserPicks {
    rated: HashSet<String>,
    picked: HashSet<String>,
    picks: Vec<String>,
    limit: usize,
}

impl UserPicks {
    pub fn new<'a>(rated: impl IntoIterator<Item = &'a String>, limit: usize) -> Self {
        Self {
            rated: rated.into_iter().cloned().collect(),
            picked: HashSet::new(),
            picks: Vec::new(),
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.picks.len() >= self.limit
    }

    /// Adds `isbn` unless full, rated, or already picked
    pub fn offer(&mut self, isbn: &str) -> bool {
        if self.is_full() || self.rated.contains(isbn) || self.picked.contains(isbn) {
            return false;
        }
        self.picked.insert(isbn.to_string());
        self.picks.push(isbn.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn into_picks(self) -> Vec<String> {
        self.picks
    }
}

/// The `k` highest-rated books; ties keep the given order
pub fn top_rated(ratings: &[(String, f32)], k: usize) -> Vec<(&str, f32)> {
    let mut sorted: Vec<(&str, f32)> = ratings
        .iter()
        .map(|(isbn, rating)| (isbn.as_str(), *rating))
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(k);
    sorted
}
