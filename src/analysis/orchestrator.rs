use super::model::{AnalysisResult, GroundingSource, SearchConfig};
use super::prompt::build_prompt;
use super::schema::response_schema;
use super::upstream::{Citation, GenerateRequest, Upstream};
use super::validate::parse_analysis;
use crate::config::{ApiKeySource, Config};
use crate::error::{AnalyzeError, Result, UpstreamError};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_SOURCE_TITLE: &str = "Search Source";

/// Attempt budget and backoff. The first attempt is always grounded, every
/// later one is plain estimation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay,
        }
    }

    /// Wait before attempt number `next` (1-based retry index) after `failure`.
    /// Dropping grounding after a capacity rejection is retried immediately;
    /// everything else backs off linearly with upward-only jitter.
    pub fn delay_before(&self, next: u32, failure: &UpstreamError) -> Duration {
        if next == 1 && failure.is_rate_limited() {
            return Duration::ZERO;
        }
        let nominal = self.base_delay * next;
        if nominal.is_zero() {
            return nominal;
        }
        nominal.mul_f64(rand::thread_rng().gen_range(1.0..=1.2))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, Duration::from_secs(1))
    }
}

/// A successful analysis and how it was obtained.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub attempts: u32,
    pub grounded: bool,
}

/// Turns a [`SearchConfig`] into a validated [`AnalysisResult`].
///
/// Holds only immutable, shared pieces; each `analyze` call keeps its attempt
/// state on its own stack, so one `Analyzer` serves any number of concurrent
/// requests.
#[derive(Clone)]
pub struct Analyzer {
    upstream: Arc<dyn Upstream>,
    api_key: ApiKeySource,
    policy: RetryPolicy,
    schema: Arc<Value>,
}

impl Analyzer {
    pub fn new(upstream: Arc<dyn Upstream>, api_key: ApiKeySource, policy: RetryPolicy) -> Self {
        Self {
            upstream,
            api_key,
            policy,
            schema: Arc::new(response_schema()),
        }
    }

    pub fn from_config(upstream: Arc<dyn Upstream>, config: &Config) -> Self {
        let policy = RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay());
        Self::new(upstream, config.api_key.clone(), policy)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn analyze(&self, config: &SearchConfig) -> Result<Analysis> {
        if config.query.trim().is_empty() {
            return Err(AnalyzeError::InvalidRequest("Query is required".into()));
        }
        let Some(api_key) = self.api_key.resolve() else {
            warn!("Analysis refused: {} is not set", self.api_key.name());
            return Err(AnalyzeError::missing_key(self.api_key.name()));
        };

        let prompt = build_prompt(config);
        debug!(platform = %config.platform, country = %config.country, "Starting keyword analysis");

        let mut attempt = 0;
        loop {
            let request = GenerateRequest {
                prompt: &prompt,
                schema: &self.schema,
                grounded: attempt == 0,
            };

            let failure = match self.attempt(&api_key, &request).await {
                Ok(result) => {
                    info!(
                        platform = %config.platform,
                        attempts = attempt + 1,
                        grounded = request.grounded,
                        sources = result.sources.len(),
                        "Keyword analysis complete"
                    );
                    return Ok(Analysis { result, attempts: attempt + 1, grounded: request.grounded });
                }
                Err(e) => e,
            };

            let made = attempt + 1;
            if failure.is_terminal() || made >= self.policy.max_attempts {
                warn!("Keyword analysis failed after {} attempt(s): {}", made, failure);
                return Err(AnalyzeError::from_upstream(failure, made, self.api_key.name()));
            }

            let delay = self.policy.delay_before(made, &failure);
            warn!(
                "Analysis attempt {}/{} failed ({}), retrying without grounding in {:?}",
                made, self.policy.max_attempts, failure, delay
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt = made;
        }
    }

    async fn attempt(&self, api_key: &str, request: &GenerateRequest<'_>) -> Result<AnalysisResult, UpstreamError> {
        let generation = self.upstream.generate(api_key, request).await?;
        let mut result = parse_analysis(&generation.text)?;
        if request.grounded {
            result.sources = extract_sources(generation.citations);
        }
        Ok(result)
    }
}

fn extract_sources(citations: Vec<Citation>) -> Vec<GroundingSource> {
    citations
        .into_iter()
        .filter_map(|c| {
            let uri = c.uri.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
            let title = c
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.into());
            Some(GroundingSource { title, uri })
        })
        .collect()
}
