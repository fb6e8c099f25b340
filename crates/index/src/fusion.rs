//! Score fusion for the hybrid retrieval core: combines a BM25 lexical
//! ranking and a vector cosine-similarity ranking into one ordering, applies
//! the root-cause heuristic against a specific error log, and groups
//! fused results by file for surfacing related files beyond the root cause.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use wrench_config::RetrievalConfig;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub bm25_score: f32,
    pub vector_score: f32,
}

#[derive(Debug, Clone)]
pub struct RankedResult {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
}

#[derive(Debug, Clone)]
pub struct FileGroup {
    pub file: String,
    pub max_score: f32,
    pub total_score: f32,
    pub results: Vec<RankedResult>,
}

/// Fuses candidates via `combined = norm(bm25_weight)*bm25 + norm(vector_weight)*vector`,
/// with weights normalized to sum to 1. Stable-sorts by combined score
/// descending, so ties keep the caller's input order (vector order first).
pub fn fuse(candidates: Vec<Candidate>, config: &RetrievalConfig) -> Vec<RankedResult> {
    let total = (config.bm25_weight + config.vector_weight).max(1e-6);
    let bm25_weight = config.bm25_weight / total;
    let vector_weight = config.vector_weight / total;

    let mut ranked: Vec<RankedResult> = candidates
        .into_iter()
        .map(|c| RankedResult {
            combined_score: bm25_weight * c.bm25_score + vector_weight * c.vector_score,
            file: c.file,
            start_line: c.start_line,
            end_line: c.end_line,
            content: c.content,
            bm25_score: c.bm25_score,
            vector_score: c.vector_score,
        })
        .collect();

    ranked.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
    ranked
}

/// Multiplies a fused result's combined score by `root_cause_filename_multiplier`
/// if its filename appears in the error log, and by `1 + root_cause_token_weight * m`
/// where `m` is the count of significant error tokens also present in the
/// result's content. Returns the index and adjusted score of the top result.
pub fn apply_root_cause_heuristic(
    results: &[RankedResult],
    error_log: &str,
    config: &RetrievalConfig,
) -> Option<(usize, f32)> {
    if results.is_empty() {
        return None;
    }

    let error_lower = error_log.to_lowercase();
    let stoplist: HashSet<&str> = config.common_words_stoplist.iter().map(|s| s.as_str()).collect();
    let error_tokens: HashSet<String> = crate::bm25::tokenize(error_log)
        .into_iter()
        .filter(|t| t.len() > 3 && !stoplist.contains(t.as_str()))
        .collect();

    let mut best: Option<(usize, f32)> = None;
    for (idx, result) in results.iter().enumerate() {
        let mut score = result.combined_score;

        let filename = result.file.rsplit('/').next().unwrap_or(&result.file);
        if !filename.is_empty() && error_lower.contains(&filename.to_lowercase()) {
            score *= config.root_cause_filename_multiplier;
        }

        let content_lower = result.content.to_lowercase();
        let m = error_tokens.iter().filter(|t| content_lower.contains(t.as_str())).count();
        score *= 1.0 + config.root_cause_token_weight * m as f32;

        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((idx, score));
        }
    }
    best
}

/// Groups results by file path, sorted by `max_score` descending.
pub fn group_by_file(results: &[RankedResult]) -> Vec<FileGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, FileGroup> = HashMap::new();

    for result in results {
        let entry = groups.entry(result.file.clone()).or_insert_with(|| {
            order.push(result.file.clone());
            FileGroup {
                file: result.file.clone(),
                max_score: 0.0,
                total_score: 0.0,
                results: Vec::new(),
            }
        });
        entry.max_score = entry.max_score.max(result.combined_score);
        entry.total_score += result.combined_score;
        entry.results.push(result.clone());
    }

    let mut out: Vec<FileGroup> = order.into_iter().filter_map(|f| groups.remove(&f)).collect();
    out.sort_by(|a, b| b.max_score.partial_cmp(&a.max_score).unwrap_or(Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RetrievalConfig {
        RetrievalConfig::default()
    }

    fn candidate(file: &str, bm25: f32, vector: f32) -> Candidate {
        Candidate {
            file: file.to_string(),
            start_line: 1,
            end_line: 10,
            content: format!("content of {file}"),
            bm25_score: bm25,
            vector_score: vector,
        }
    }

    #[test]
    fn fusion_weights_favor_vector_by_default() {
        let ranked = fuse(vec![candidate("a.rs", 1.0, 0.0), candidate("b.rs", 0.0, 1.0)], &cfg());
        assert_eq!(ranked[0].file, "b.rs");
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let ranked = fuse(vec![candidate("a.rs", 2.0, 0.0)], &cfg());
        assert_eq!(ranked[0].vector_score, 0.0);
    }

    #[test]
    fn root_cause_boosts_matching_filename() {
        let results = vec![
            RankedResult { file: "db.rs".to_string(), start_line: 1, end_line: 5, content: "connects to the database pool".to_string(), bm25_score: 0.0, vector_score: 0.0, combined_score: 0.5 },
            RankedResult { file: "other.rs".to_string(), start_line: 1, end_line: 5, content: "unrelated helper".to_string(), bm25_score: 0.0, vector_score: 0.0, combined_score: 0.6 },
        ];
        let error_log = "panicked at db.rs:12: connection refused";
        let (idx, _) = apply_root_cause_heuristic(&results, error_log, &cfg()).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn grouping_sorts_by_max_score_desc() {
        let results = vec![
            RankedResult { file: "a.rs".to_string(), start_line: 1, end_line: 5, content: String::new(), bm25_score: 0.0, vector_score: 0.0, combined_score: 0.3 },
            RankedResult { file: "b.rs".to_string(), start_line: 1, end_line: 5, content: String::new(), bm25_score: 0.0, vector_score: 0.0, combined_score: 0.9 },
            RankedResult { file: "a.rs".to_string(), start_line: 10, end_line: 15, content: String::new(), bm25_score: 0.0, vector_score: 0.0, combined_score: 0.1 },
        ];
        let groups = group_by_file(&results);
        assert_eq!(groups[0].file, "b.rs");
        assert_eq!(groups[1].file, "a.rs");
        assert!((groups[1].total_score - 0.4).abs() < 1e-5);
    }
}
