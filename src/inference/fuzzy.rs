//! Approximate string search over a small, append-only corpus.
//!
//! Scores run from 0.0 (identical) to 1.0 (nothing in common). A candidate is
//! a hit when its score is at or under the index threshold. The score is the
//! better of two measures:
//!
//! * whole-string edit distance, normalized by the longer string;
//! * the query occurring verbatim inside the candidate, penalized by how far
//!   from the start it occurs (one hundredth per character).

use strsim::normalized_levenshtein;

/// Characters of offset that cost a full point when the query is found inside a candidate.
const LOCATION_DISTANCE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyHit<'a> {
    pub item: &'a str,
    /// Registration order, starting at 0.
    pub index: usize,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct FuzzyIndex {
    items: Vec<String>,
    threshold: f64,
    min_query_len: usize,
}

impl FuzzyIndex {
    pub fn new(threshold: f64) -> Self {
        Self {
            items: Vec::new(),
            threshold,
            min_query_len: 1,
        }
    }

    /// Queries shorter than `len` characters never match anything.
    pub fn with_min_query_len(mut self, len: usize) -> Self {
        self.min_query_len = len.max(1);
        self
    }

    /// Returns the registration index of `item`.
    pub fn add(&mut self, item: impl Into<String>) -> usize {
        self.items.push(item.into());
        self.items.len() - 1
    }

    /// Hits ordered by score, then by registration order.
    pub fn search(&self, query: &str) -> Vec<FuzzyHit<'_>> {
        if query.chars().count() < self.min_query_len {
            return Vec::new();
        }

        let mut hits: Vec<FuzzyHit<'_>> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let score = score(query, item);
                (score <= self.threshold).then_some(FuzzyHit {
                    item: item.as_str(),
                    index,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.index.cmp(&b.index)));
        hits
    }
}

pub fn score(query: &str, candidate: &str) -> f64 {
    if query == candidate {
        return 0.0;
    }
    let whole = 1.0 - normalized_levenshtein(query, candidate);
    let inside = candidate
        .find(query)
        .map(|at| candidate[..at].chars().count() as f64 / LOCATION_DISTANCE);

    match inside {
        Some(partial) => partial.min(whole),
        None => whole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert_eq!(score("YAMAHA", "YAMAHA"), 0.0);
        assert_eq!(score("YAMAHA", "YAMAHA P 125"), 0.0);
        assert!(score("YAMAHA", "YAMAHHA") < 0.2);
        assert!(score("YAMAHA", "KORG") > 0.8);
    }

    #[test]
    fn test_search_respects_threshold() {
        let mut idx = FuzzyIndex::new(0.3);
        idx.add("YAMAHA");
        idx.add("KAWAI");
        idx.add("ROLAND");

        let hits = idx.search("YAMHA");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item, "YAMAHA");

        assert!(idx.search("STEINWAY").is_empty());
    }

    #[test]
    fn test_search_orders_by_score_then_registration() {
        let mut idx = FuzzyIndex::new(0.5);
        idx.add("THE KAWAI");
        idx.add("KAWAI");
        idx.add("KAWAI CA");

        let hits = idx.search("KAWAI");
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        // both start with the query and tie at 0.0; the offset match comes last
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_min_query_len() {
        let mut idx = FuzzyIndex::new(0.5).with_min_query_len(3);
        assert_eq!(idx.add("88"), 0);
        assert!(idx.search("88").is_empty());
        assert_eq!(idx.search("888").len(), 1);
    }
}
