use crate::fusion::RankedResult;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub content: String,
}

impl From<RankedResult> for SearchResult {
    fn from(r: RankedResult) -> Self {
        Self {
            file: r.file,
            start_line: r.start_line,
            end_line: r.end_line,
            score: r.combined_score,
            bm25_score: r.bm25_score,
            vector_score: r.vector_score,
            content: r.content,
        }
    }
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (lines {}-{}, score: {:.3})",
            self.file, self.start_line, self.end_line, self.score
        )
    }
}

/// A group of ranked results sharing a file path, surfaced as "related
/// files" alongside a root-cause guess.
#[derive(Debug, Clone)]
pub struct FileGroupResult {
    pub file: String,
    pub max_score: f32,
    pub total_score: f32,
    pub results: Vec<SearchResult>,
}

impl From<crate::fusion::FileGroup> for FileGroupResult {
    fn from(g: crate::fusion::FileGroup) -> Self {
        Self {
            file: g.file,
            max_score: g.max_score,
            total_score: g.total_score,
            results: g.results.into_iter().map(SearchResult::from).collect(),
        }
    }
}

/// The outcome of a root-cause diagnosis: the single best-guess root cause
/// (if any result scored), plus the rest of the fused results grouped by
/// file so a caller can surface related files beyond it.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisOutcome {
    pub root_cause: Option<SearchResult>,
    pub related_files: Vec<FileGroupResult>,
}
