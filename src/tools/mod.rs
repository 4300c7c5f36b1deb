pub mod analyze;
pub mod config;

pub use analyze::AnalyzeKeywordParams;
pub use config::{GetConfigInfoParams, ListPlatformsParams};
