#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("HTTP error: {status} - {body}")]
    Http { status: u16, body: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("empty completion from planner")]
    EmptyCompletion,
}

impl PlannerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlannerError::RateLimited { .. } | PlannerError::Http { status: 500..=599, .. }
        )
    }

    pub fn from_http(status: u16, body: String, retry_after: Option<&str>) -> Self {
        if status == 429 {
            let retry_after_ms = retry_after
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return PlannerError::RateLimited { retry_after_ms };
        }
        PlannerError::Http { status, body }
    }
}
