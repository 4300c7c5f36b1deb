//! HTTP request handlers

use super::state::AppState;
use crate::analysis::{Platform, SearchConfig, DEFAULT_COUNTRY, DEFAULT_LANGUAGE};
use crate::error::AnalyzeError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

const ATTEMPTS_HEADER: &str = "x-rankkv-attempts";
const GROUNDED_HEADER: &str = "x-rankkv-grounded";

/// Body of `POST /api/analyze`. Every field is optional here so that a
/// missing query gets our own 400 instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeBody {
    pub query: Option<String>,
    pub platform: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

impl AnalyzeBody {
    fn into_config(self) -> Result<SearchConfig, Response> {
        let query = self.query.as_deref().map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(error_response(StatusCode::BAD_REQUEST, "Query is required"));
        }

        let platform = match non_blank(self.platform.as_deref()) {
            Some(p) => p
                .parse::<Platform>()
                .map_err(|msg| error_response(StatusCode::BAD_REQUEST, msg))?,
            None => Platform::Google,
        };

        let mut config = SearchConfig::new(query)
            .platform(platform)
            .country(non_blank(self.country.as_deref()).unwrap_or(DEFAULT_COUNTRY))
            .language(non_blank(self.language.as_deref()).unwrap_or(DEFAULT_LANGUAGE));
        if let (Some(lat), Some(lng)) = (self.lat, self.lng) {
            if lat.is_finite() && lng.is_finite() {
                config = config.location(lat, lng);
            }
        }
        Ok(config)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// `POST /api/analyze`
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Rejected analyze body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    let config = match body.into_config() {
        Ok(config) => config,
        Err(response) => return response,
    };

    let outcome = tokio::time::timeout(state.analyze_timeout, state.analyzer.analyze(&config)).await;
    let analysis = match outcome {
        Ok(Ok(analysis)) => analysis,
        Ok(Err(err)) => return analyze_error_response(err),
        Err(_) => {
            warn!("Analysis timed out after {:?}", state.analyze_timeout);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Analysis timed out after {} seconds", state.analyze_timeout.as_secs()),
            );
        }
    };

    let mut response = Json(analysis.result).into_response();
    let headers = response.headers_mut();
    headers.insert(ATTEMPTS_HEADER, HeaderValue::from(analysis.attempts));
    headers.insert(GROUNDED_HEADER, HeaderValue::from_static(if analysis.grounded { "true" } else { "false" }));
    response
}

fn analyze_error_response(err: AnalyzeError) -> Response {
    match &err {
        AnalyzeError::InvalidRequest(msg) => error_response(StatusCode::BAD_REQUEST, msg.clone()),
        AnalyzeError::Configuration(detail) => {
            error!("Analysis unavailable: {}", detail);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "API key not configured")
        }
        _ => {
            error!(kind = err.kind(), attempts = err.attempts(), "Analysis error: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Any non-POST method on `/api/analyze`
pub async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::{create_router, AppState};
    use crate::analysis::{
        sample_payload, Analyzer, GenerateRequest, Generation, RetryPolicy, Upstream,
    };
    use crate::config::ApiKeySource;
    use crate::error::UpstreamError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Stub {
        outcomes: Mutex<VecDeque<Result<Generation, UpstreamError>>>,
        calls: AtomicUsize,
        hang: bool,
    }

    impl Stub {
        fn with(outcomes: Vec<Result<Generation, UpstreamError>>) -> Arc<Self> {
            Arc::new(Self { outcomes: Mutex::new(outcomes.into()), ..Default::default() })
        }
    }

    #[async_trait]
    impl Upstream for Stub {
        async fn generate(&self, _api_key: &str, _request: &GenerateRequest<'_>) -> Result<Generation, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(UpstreamError::Api { status: 500, message: "boom".into() }))
        }
    }

    fn success() -> Result<Generation, UpstreamError> {
        Ok(Generation { text: sample_payload().to_string(), citations: Vec::new() })
    }

    fn app_with(stub: Arc<Stub>, key: Option<&str>) -> Router {
        let analyzer = Analyzer::new(
            stub,
            ApiKeySource::Fixed(key.map(Into::into)),
            RetryPolicy::new(3, Duration::ZERO),
        );
        create_router(AppState::new(analyzer, Duration::from_secs(5)))
    }

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let attempts = response
            .headers()
            .get("x-rankkv-attempts")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body, attempts)
    }

    #[tokio::test]
    async fn get_is_method_not_allowed() {
        let app = app_with(Stub::with(vec![]), Some("key"));
        let request = Request::builder().uri("/api/analyze").body(Body::empty()).unwrap();
        let (status, body, _) = send(app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({ "error": "Method not allowed" }));
    }

    #[tokio::test]
    async fn missing_query_is_bad_request() {
        for payload in [json!({ "platform": "Google" }), json!({ "query": "   " })] {
            let app = app_with(Stub::with(vec![]), Some("key"));
            let (status, body, _) = send(app, post(payload.to_string())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({ "error": "Query is required" }));
        }
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let app = app_with(Stub::with(vec![]), Some("key"));
        let (status, body, _) = send(app, post("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON body" }));
    }

    #[tokio::test]
    async fn unknown_platform_is_bad_request() {
        let stub = Stub::with(vec![success()]);
        let app = app_with(stub.clone(), Some("key"));
        let (status, body, _) = send(app, post(json!({ "query": "shoes", "platform": "Geocities" }).to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported platform: Geocities");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_key_is_server_error_without_upstream_call() {
        let stub = Stub::with(vec![success()]);
        let app = app_with(stub.clone(), None);
        let (status, body, _) = send(app, post(json!({ "query": "shoes" }).to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "API key not configured" }));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_returns_analysis_json() {
        let app = app_with(Stub::with(vec![success()]), Some("key"));
        let payload = json!({ "query": "best running shoes", "platform": "Google", "country": "US", "language": "en" });
        let (status, body, attempts) = send(app, post(payload.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        let mut expected = sample_payload();
        expected["sources"] = json!([]);
        assert_eq!(body, expected);
        assert_eq!(attempts.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn rate_limit_fallback_reports_two_attempts() {
        let limited = Err(UpstreamError::RateLimited { status: 429, message: "quota".into() });
        let app = app_with(Stub::with(vec![limited, success()]), Some("key"));
        let (status, _, attempts) = send(app, post(json!({ "query": "shoes" }).to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(attempts.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_message() {
        let stub = Stub::with(vec![]);
        let app = app_with(stub.clone(), Some("key"));
        let (status, body, _) = send(app, post(json!({ "query": "shoes" }).to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "API error (500): boom" }));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out() {
        let stub = Arc::new(Stub { hang: true, ..Default::default() });
        let analyzer = Analyzer::new(stub, ApiKeySource::Fixed(Some("key".into())), RetryPolicy::default());
        let app = create_router(AppState::new(analyzer, Duration::from_secs(2)));
        let (status, body, _) = send(app, post(json!({ "query": "shoes" }).to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Analysis timed out after 2 seconds" }));
    }

    #[test]
    fn country_and_language_are_normalised() {
        let body = super::AnalyzeBody {
            query: Some("shoes".into()),
            country: Some(" gb ".into()),
            language: Some("EN".into()),
            ..Default::default()
        };
        let Ok(config) = body.into_config() else { panic!("body rejected") };
        assert_eq!(config.country, "GB");
        assert_eq!(config.language, "en");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app_with(Stub::with(vec![]), None);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body, _) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
