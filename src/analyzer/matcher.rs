use crate::config::MatchConfig;
use crate::model::{MatchRecord, MatchTier, SearchCandidate};
use strsim::normalized_levenshtein;

/// Buckets query/candidate name similarity into confidence tiers.
pub struct MatchClassifier {
    exact_threshold: f64,
    close_threshold: f64,
}

impl MatchClassifier {
    pub fn new(cfg: &MatchConfig) -> Self {
        Self {
            exact_threshold: cfg.exact_threshold,
            close_threshold: cfg.close_threshold,
        }
    }

    /// Normalized Levenshtein ratio over the case-folded, trimmed strings.
    pub fn similarity(a: &str, b: &str) -> f64 {
        normalized_levenshtein(&a.trim().to_lowercase(), &b.trim().to_lowercase())
    }

    /// Lower bounds are inclusive.
    pub fn tier_for(&self, score: f64) -> MatchTier {
        if score >= self.exact_threshold {
            MatchTier::Exact
        } else if score >= self.close_threshold {
            MatchTier::Close
        } else {
            MatchTier::Low
        }
    }

    pub fn classify(&self, query: &str, candidate: &str) -> MatchRecord {
        let score = Self::similarity(query, candidate);
        MatchRecord {
            query_name: query.to_string(),
            candidate_name: Some(candidate.to_string()),
            candidate_url: None,
            similarity_score: score,
            tier: self.tier_for(score),
        }
    }

    /// No candidate at all, as opposed to a poor one.
    pub fn not_found(query: &str) -> MatchRecord {
        MatchRecord {
            query_name: query.to_string(),
            candidate_name: None,
            candidate_url: None,
            similarity_score: 0.0,
            tier: MatchTier::NotFound,
        }
    }

    /// Best-scoring candidate; the earliest one wins ties.
    pub fn classify_best(&self, query: &str, candidates: &[SearchCandidate]) -> MatchRecord {
        let mut best: Option<MatchRecord> = None;
        for candidate in candidates {
            let mut record = self.classify(query, &candidate.name);
            record.candidate_url = Some(candidate.url.clone());
            if best
                .as_ref()
                .is_none_or(|b| record.similarity_score > b.similarity_score)
            {
                best = Some(record);
            }
        }
        best.unwrap_or_else(|| Self::not_found(query))
    }
}
