use crate::analysis::{DEFAULT_COUNTRY, DEFAULT_LANGUAGE, Platform, SearchConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const MAX_QUERY_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeKeywordParams {
    /// Keyword or phrase to research (max 500 characters)
    pub query: String,

    /// Channel to research, e.g. "Google", "YouTube", "Amazon", "TikTok" (default "Google")
    #[serde(default)]
    pub platform: Option<String>,

    /// Region code, e.g. "US", "GB", "DE" (default "US")
    #[serde(default)]
    pub country: Option<String>,

    /// Language code, e.g. "en", "de" (default "en")
    #[serde(default)]
    pub language: Option<String>,
}

impl AnalyzeKeywordParams {
    pub fn validate(&self) -> Result<SearchConfig, String> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err("Query cannot be empty".into());
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(format!("Query exceeds {MAX_QUERY_CHARS} characters"));
        }

        let platform = match non_blank(&self.platform) {
            Some(p) => p.parse::<Platform>()?,
            None => Platform::Google,
        };
        let country = non_blank(&self.country).unwrap_or(DEFAULT_COUNTRY);
        let language = non_blank(&self.language).unwrap_or(DEFAULT_LANGUAGE);

        Ok(SearchConfig::new(query).platform(platform).country(country).language(language))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str, platform: Option<&str>) -> AnalyzeKeywordParams {
        AnalyzeKeywordParams {
            query: query.into(),
            platform: platform.map(Into::into),
            country: None,
            language: None,
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = params("  coffee grinder ", None).validate().unwrap();
        assert_eq!(config.query, "coffee grinder");
        assert_eq!(config.platform, Platform::Google);
        assert_eq!(config.country, "US");
        assert_eq!(config.language, "en");
    }

    #[test]
    fn rejects_blank_long_and_unknown() {
        assert!(params(" ", None).validate().is_err());
        assert!(params(&"a".repeat(501), None).validate().is_err());
        assert_eq!(
            params("coffee", Some("Friendster")).validate().unwrap_err(),
            "Unsupported platform: Friendster"
        );
    }

    #[test]
    fn normalizes_codes() {
        let mut p = params("coffee", Some("tiktok"));
        p.country = Some("de".into());
        p.language = Some("DE".into());
        let config = p.validate().unwrap();
        assert_eq!(config.platform, Platform::TikTok);
        assert_eq!(config.country, "DE");
        assert_eq!(config.language, "de");
    }
}
