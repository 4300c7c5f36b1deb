//! Keyword analysis: prompt and schema construction, response validation,
//! and the grounded-then-estimated retry loop around the model call.

mod model;
mod orchestrator;
mod prompt;
mod schema;
mod upstream;
mod validate;

pub use model::{Platform, PlatformCategory, SearchConfig, DEFAULT_COUNTRY, DEFAULT_LANGUAGE};
pub use orchestrator::{Analyzer, RetryPolicy};
pub use upstream::{Citation, GenerateRequest, Generation, Upstream};

#[cfg(test)]
pub(crate) use schema::response_schema;
#[cfg(test)]
pub(crate) use validate::tests::valid_payload as sample_payload;

pub const TREND_MONTHS: usize = 12;
pub const MAX_RELATED: usize = 12;
pub const CLUSTER_COUNT: usize = 3;
