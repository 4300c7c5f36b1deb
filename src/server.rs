use crate::analysis::{Analyzer, Platform, PlatformCategory};
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::tools::{AnalyzeKeywordParams, GetConfigInfoParams, ListPlatformsParams};

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use std::sync::Arc;

#[derive(Clone)]
pub struct RankKvServer {
    pub config: Config,
    pub client: GeminiClient,
    pub analyzer: Analyzer,
}

impl RankKvServer {
    pub fn new(config: Config, client: GeminiClient) -> Self {
        let analyzer = Analyzer::from_config(Arc::new(client.clone()), &config);
        Self { config, client, analyzer }
    }
}

#[tool_router]
impl RankKvServer {
    #[tool(description = r#"
    Researches a keyword for a given platform and region and returns a JSON analysis.

    The `query` is the keyword or phrase to research, e.g. "best running shoes".
    The `platform` is the channel to research (Google, YouTube, Amazon, TikTok, ...);
    see `list_platforms` for the accepted names.
    The `country` and `language` are region and language codes such as "US" and "en".

    The result contains estimated monthly volume, USD CPC, competition (0-1),
    search intent, a 12-month trend, up to 12 related long-tail keywords,
    3 topical clusters, a short strategy summary and any web sources consulted.
    All figures are model estimates, not measured data.
    "#)]
    pub async fn analyze_keyword(&self, Parameters(params): Parameters<AnalyzeKeywordParams>) -> Result<String, McpError> {
        let search = params.validate().map_err(|msg| McpError::invalid_params(msg, None))?;
        let analysis = self
            .analyzer
            .analyze(&search)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        serde_json::to_string_pretty(&analysis.result).map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    #[tool(description = r#"
    Lists the platforms `analyze_keyword` accepts, grouped by category.

    Returns
    -------
    str
        A JSON object mapping category labels (e.g. "Search Engines") to platform names.
    "#)]
    pub async fn list_platforms(&self, _params: Parameters<ListPlatformsParams>) -> Result<String, McpError> {
        serde_json::to_string_pretty(&platforms_by_category()).map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    #[tool(description = r#"
    Returns the current RankKV configuration and tests the connection to the model API.

    Returns
    -------
    str
        A JSON-encoded string containing:
        - `api_url`: The configured Gemini API endpoint
        - `api_key`: The API key (masked, showing only first and last 4 characters)
        - `model`: The model used for analysis
        - `retry_max_attempts` / `retry_base_delay_ms`: Retry policy
        - `connection_test`: Result of listing models with the configured key
    "#)]
    pub async fn get_config_info(&self, _params: Parameters<GetConfigInfoParams>) -> Result<String, McpError> {
        let connection_test = self.client.test_connection(&self.config.api_key).await;
        let policy = self.analyzer.policy();

        let payload = serde_json::json!({
            "api_url": &self.config.api_url,
            "api_key": self.config.mask_api_key(),
            "model": &self.config.model,
            "retry_max_attempts": policy.max_attempts,
            "retry_base_delay_ms": policy.base_delay.as_millis() as u64,
            "request_timeout_secs": self.config.request_timeout,
            "connection_test": connection_test,
        });

        serde_json::to_string_pretty(&payload).map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

#[tool_handler(router = Self::tool_router())]
impl ServerHandler for RankKvServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "rankkv".into(),
                title: None,
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn platforms_by_category() -> serde_json::Map<String, serde_json::Value> {
    let categories = [
        PlatformCategory::SearchEngine,
        PlatformCategory::VideoSocial,
        PlatformCategory::Commerce,
        PlatformCategory::AiAnswer,
        PlatformCategory::Specialty,
    ];
    categories
        .into_iter()
        .map(|category| {
            let names: Vec<&str> = Platform::ALL
                .iter()
                .filter(|p| p.category() == category)
                .map(|p| p.name())
                .collect();
            (category.label().to_string(), serde_json::json!(names))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_platform_listed_once() {
        let listed = platforms_by_category();
        let total: usize = listed.values().map(|v| v.as_array().unwrap().len()).sum();
        assert_eq!(total, Platform::ALL.len());
        assert!(listed["AI & Emerging"].as_array().unwrap().contains(&serde_json::json!("Perplexity AI")));
    }
}
