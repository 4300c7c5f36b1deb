use crate::error::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;

/// One call to the generative model.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub schema: &'a Value,
    /// Let the model consult live web search before answering.
    pub grounded: bool,
}

/// Raw model output before validation.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Citation {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// A structured-output model endpoint.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn generate(&self, api_key: &str, request: &GenerateRequest<'_>) -> Result<Generation, UpstreamError>;
}
