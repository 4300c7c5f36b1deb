use crate::analysis::Analyzer;
use std::time::Duration;

/// Shared application state. Everything in it is immutable; per-request
/// state lives inside each `Analyzer::analyze` call.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
    /// Overall deadline for one analysis, retries and backoff included.
    pub analyze_timeout: Duration,
}

impl AppState {
    pub fn new(analyzer: Analyzer, analyze_timeout: Duration) -> Self {
        Self { analyzer, analyze_timeout }
    }
}
