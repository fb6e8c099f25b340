//! Wires query preparation, independent BM25/vector ranking, and score
//! fusion into the hybrid retrieval core's single entry point. Both
//! modalities rank the same corpus independently at an expanded top-k
//! before fusion, so a document strong in only one modality still has a
//! chance to survive into the fused ranking.

use std::cmp::Ordering;
use std::collections::HashSet;

use wrench_config::RetrievalConfig;

use crate::bm25::{self, Bm25Index};
use crate::fusion::{self, Candidate, RankedResult};
use crate::query_prep;
use crate::store::ChunkRecord;

pub fn search(
    corpus: &[ChunkRecord],
    query_vec: &[f32],
    raw_query: &str,
    limit: usize,
    config: &RetrievalConfig,
) -> Vec<RankedResult> {
    if corpus.is_empty() || limit == 0 {
        return Vec::new();
    }

    let prepared_query = query_prep::prepare(raw_query);
    let query_tokens = bm25::tokenize(&prepared_query);

    let expanded_k = (config.expansion_factor * limit).min(corpus.len()).max(1);

    let mut vector_ranked: Vec<(usize, f32)> = corpus
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_similarity(query_vec, &c.embedding)))
        .collect();
    vector_ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    vector_ranked.truncate(expanded_k);

    let texts: Vec<&str> = corpus.iter().map(|c| c.text.as_str()).collect();
    let bm25_index = Bm25Index::build(&texts);
    let mut bm25_ranked: Vec<(usize, f32)> = (0..corpus.len())
        .map(|i| (i, bm25_index.score(i, &query_tokens)))
        .filter(|(_, s)| *s > 0.0)
        .collect();
    bm25_ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    bm25_ranked.truncate(expanded_k);

    let vector_scores: std::collections::HashMap<usize, f32> = vector_ranked.iter().cloned().collect();
    let bm25_scores: std::collections::HashMap<usize, f32> = bm25_ranked.iter().cloned().collect();

    // Union, vector order first, so fusion's stable sort breaks ties by
    // incoming vector order as required.
    let mut seen = HashSet::new();
    let mut order: Vec<usize> = Vec::new();
    for (idx, _) in &vector_ranked {
        if seen.insert(*idx) {
            order.push(*idx);
        }
    }
    for (idx, _) in &bm25_ranked {
        if seen.insert(*idx) {
            order.push(*idx);
        }
    }

    let candidates: Vec<Candidate> = order
        .into_iter()
        .map(|idx| {
            let c = &corpus[idx];
            Candidate {
                file: c.file_path.clone(),
                start_line: c.start_line,
                end_line: c.end_line,
                content: c.text.clone(),
                bm25_score: *bm25_scores.get(&idx).unwrap_or(&0.0),
                vector_score: *vector_scores.get(&idx).unwrap_or(&0.0),
            }
        })
        .collect();

    let mut ranked = fusion::fuse(candidates, config);
    ranked.truncate(limit);
    ranked
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, file: &str, text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord { id, file_path: file.to_string(), start_line: 1, end_line: 5, text: text.to_string(), embedding }
    }

    #[test]
    fn empty_corpus_returns_no_results() {
        let cfg = RetrievalConfig::default();
        let results = search(&[], &[1.0, 0.0], "anything", 5, &cfg);
        assert!(results.is_empty());
    }

    #[test]
    fn lexical_only_match_still_surfaces() {
        let cfg = RetrievalConfig::default();
        let corpus = vec![
            record(1, "db.rs", "connection refused while dialing the database", vec![1.0, 0.0]),
            record(2, "unrelated.rs", "completely different content here", vec![0.0, 1.0]),
        ];
        // query vector orthogonal to both so only BM25 distinguishes them
        let results = search(&corpus, &[0.0, 0.0], "connection refused database", 2, &cfg);
        assert_eq!(results[0].file, "db.rs");
    }

    #[test]
    fn cosine_identical_vectors_score_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }
}
