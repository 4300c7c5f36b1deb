use super::types::{
    Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    GoogleSearch, TextPart, Tool,
};
use crate::analysis::{Citation, GenerateRequest, Generation, Upstream};
use crate::config::{ApiKeySource, Config};
use crate::error::{ConfigError, UpstreamError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: u64 = 10;
const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionTestResult {
    fn error(code: &str, elapsed: Option<u64>, message: String) -> Self {
        Self {
            status: "error".into(),
            response_time_ms: elapsed,
            model_count: None,
            error_code: Some(code.into()),
            message: Some(message),
        }
    }
}

/// HTTP client for Gemini's `generateContent`. The API key travels per call
/// so it is always the one resolved for the current analysis.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    request_timeout: u64,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let agent = format!("rankkv/{}", env!("CARGO_PKG_VERSION"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&agent).map_err(|e| ConfigError::Invalid(e.to_string()))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            model: config.model.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Lists models with the current key; used by the config report.
    pub async fn test_connection(&self, api_key: &ApiKeySource) -> ConnectionTestResult {
        let Some(key) = api_key.resolve() else {
            return ConnectionTestResult::error("NO_API_KEY", None, format!("{} is not configured", api_key.name()));
        };

        let url = format!("{}/models", self.base_url);
        let start = Instant::now();

        match self.client.get(&url).header(API_KEY_HEADER, key).send().await {
            Ok(resp) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let status = resp.status();

                if !status.is_success() {
                    let code = status.as_u16();
                    return ConnectionTestResult::error(classify_status(code), Some(elapsed), format!("HTTP {code}"));
                }
                match resp.json::<serde_json::Value>().await {
                    Ok(v) => ConnectionTestResult {
                        status: "success".into(),
                        response_time_ms: Some(elapsed),
                        model_count: v.get("models").and_then(|d| d.as_array()).map(|a| a.len()),
                        error_code: None,
                        message: Some(format!("OK (HTTP {})", status.as_u16())),
                    },
                    Err(e) => ConnectionTestResult::error("PARSE_ERROR", Some(elapsed), e.to_string()),
                }
            }
            Err(e) => {
                let code = if e.is_timeout() {
                    "TIMEOUT"
                } else if e.is_connect() {
                    "CONNECTION_FAILURE"
                } else {
                    "NETWORK_ERROR"
                };
                ConnectionTestResult::error(code, None, e.to_string())
            }
        }
    }

    fn map_err(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() { UpstreamError::Timeout(self.request_timeout) } else { UpstreamError::Http(e) }
    }
}

#[async_trait]
impl Upstream for GeminiClient {
    async fn generate(&self, api_key: &str, request: &GenerateRequest<'_>) -> Result<Generation, UpstreamError> {
        // Search grounding cannot be combined with responseSchema, so grounded
        // calls carry the schema in the prompt and rely on local validation.
        let grounded_prompt;
        let payload = if request.grounded {
            grounded_prompt = with_inline_schema(request.prompt, request.schema);
            GenerateContentRequest {
                contents: vec![Content { role: "user", parts: vec![TextPart { text: &grounded_prompt }] }],
                generation_config: None,
                tools: vec![Tool { google_search: GoogleSearch::default() }],
            }
        } else {
            GenerateContentRequest {
                contents: vec![Content { role: "user", parts: vec![TextPart { text: request.prompt }] }],
                generation_config: Some(GenerationConfig {
                    response_mime_type: "application/json",
                    response_schema: request.schema,
                }),
                tools: Vec::new(),
            }
        };

        debug!(model = %self.model, grounded = request.grounded, "Calling generateContent");
        let resp = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let body = resp.text().await.map_err(|e| self.map_err(e))?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Malformed(format!("unreadable response envelope: {e}")))?;
        into_generation(parsed)
    }
}

fn with_inline_schema(prompt: &str, schema: &serde_json::Value) -> String {
    format!("{prompt}\n\nRespond with only the JSON object, no prose or markdown. It must match this schema:\n{schema}")
}

fn into_generation(resp: GenerateContentResponse) -> Result<Generation, UpstreamError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked ({r})"))
            .unwrap_or_else(|| "no candidates returned".into());
        return Err(UpstreamError::Malformed(reason));
    };

    let text = candidate.text();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
        warn!("Model returned no text (finish reason {})", reason);
        return Err(UpstreamError::Malformed(format!("empty response (finish reason {reason})")));
    }

    let citations = candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .map(|web| Citation { title: web.title, uri: web.uri })
        .collect();

    Ok(Generation { text, citations })
}

/// Maps a non-2xx response onto the retry classes using the structured
/// fields of Google's error body, falling back to the HTTP status.
fn classify_error(status: u16, body: &str) -> UpstreamError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = envelope
        .as_ref()
        .map(|e| e.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| truncate(body, MAX_ERROR_BODY));

    let (api_status, reasons): (&str, Vec<&str>) = match &envelope {
        Some(e) => (e.status.as_str(), e.details.iter().filter_map(|d| d.reason.as_deref()).collect()),
        None => ("", Vec::new()),
    };

    if reasons.contains(&"API_KEY_INVALID") {
        return UpstreamError::InvalidCredential(message);
    }
    let code = envelope.as_ref().map(|e| e.code).filter(|c| *c != 0).unwrap_or(status);
    if matches!(code, 429 | 503) || matches!(api_status, "RESOURCE_EXHAUSTED" | "UNAVAILABLE") {
        return UpstreamError::RateLimited { status, message };
    }
    UpstreamError::Api { status, message }
}

fn classify_status(code: u16) -> &'static str {
    match code {
        400 => "BAD_REQUEST",
        401 | 403 => "AUTH_ERROR",
        404 => "NOT_FOUND",
        429 => "RATE_LIMIT",
        500..=599 => "SERVER_ERROR",
        _ => "HTTP_ERROR",
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
