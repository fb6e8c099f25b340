//! Okapi BM25 scoring over the full set of indexed chunks. Unlike a reranker
//! that scores a pre-filtered shortlist, this builds its document-frequency
//! and average-length statistics from the whole corpus, since the hybrid
//! core needs a BM25 ranking independent of whatever the vector side found.

use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

pub struct Bm25Index {
    doc_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f32,
}

impl Bm25Index {
    pub fn build(documents: &[&str]) -> Self {
        let doc_tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;
        for tokens in &doc_tokens {
            total_len += tokens.len();
            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let doc_count = doc_tokens.len().max(1);
        let avg_doc_len = total_len as f32 / doc_count as f32;

        Self { doc_tokens, doc_freq, avg_doc_len }
    }

    pub fn len(&self) -> usize {
        self.doc_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_tokens.is_empty()
    }

    pub fn score(&self, doc_idx: usize, query_tokens: &[String]) -> f32 {
        let Some(tokens) = self.doc_tokens.get(doc_idx) else {
            return 0.0;
        };
        if tokens.is_empty() || query_tokens.is_empty() {
            return 0.0;
        }

        let dl = tokens.len() as f32;
        let total_docs = self.doc_tokens.len().max(1) as f32;
        let mut score = 0.0;

        for term in query_tokens {
            let freq = tokens.iter().filter(|t| *t == term).count() as f32;
            if freq <= 0.0 {
                continue;
            }
            let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
            let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
            let denom = freq + K1 * (1.0 - B + B * dl / self.avg_doc_len.max(1e-3));
            if denom > 0.0 {
                score += idf * (freq * (K1 + 1.0)) / denom;
            }
        }

        score
    }
}

/// ASCII alphanumeric splitting with camelCase expansion and lowercasing --
/// the same tokenization idiom the embedder's TF-IDF fallback uses, so
/// lexical and vector terms line up on the same vocabulary.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch);
        } else if !current.is_empty() {
            split_camel_case(&current, &mut tokens);
            current.clear();
        }
    }
    if !current.is_empty() {
        split_camel_case(&current, &mut tokens);
    }

    tokens
}

fn split_camel_case(word: &str, out: &mut Vec<String>) {
    out.push(word.to_lowercase());
    let chars: Vec<char> = word.chars().collect();
    let mut start = 0;
    for i in 1..chars.len() {
        if chars[i].is_uppercase() && !chars[i - 1].is_uppercase() {
            let part: String = chars[start..i].iter().collect();
            if part.len() > 1 {
                out.push(part.to_lowercase());
            }
            start = i;
        }
    }
    if start > 0 && start < chars.len() {
        let part: String = chars[start..].iter().collect();
        if part.len() > 1 {
            out.push(part.to_lowercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_camel_case() {
        let tokens = tokenize("parseJsonPayload");
        assert!(tokens.contains(&"parsejsonpayload".to_string()));
        assert!(tokens.contains(&"parse".to_string()));
        assert!(tokens.contains(&"json".to_string()));
        assert!(tokens.contains(&"payload".to_string()));
    }

    #[test]
    fn documents_sharing_rare_terms_score_higher() {
        let docs = vec![
            "connection refused while dialing the database",
            "connection refused while dialing the database",
            "completely unrelated text about fruit baskets",
        ];
        let index = Bm25Index::build(&docs);
        let query = tokenize("connection refused database");
        let score_a = index.score(0, &query);
        let score_c = index.score(2, &query);
        assert!(score_a > score_c);
    }

    #[test]
    fn missing_terms_score_zero() {
        let docs = vec!["alpha beta gamma"];
        let index = Bm25Index::build(&docs);
        let query = tokenize("delta epsilon");
        assert_eq!(index.score(0, &query), 0.0);
    }
}
