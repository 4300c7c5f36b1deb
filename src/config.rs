use crate::error::ConfigError;
use std::net::SocketAddr;
use std::time::Duration;

type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_KEY_VAR: &str = "GEMINI_API_KEY";
const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Values some deployments leave behind when a key was never set.
const UNSET_SENTINELS: [&str; 2] = ["undefined", "null"];

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: ApiKeySource,
    pub model: String,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout: u64,
    pub analyze_timeout: u64,
    pub bind: SocketAddr,
}

/// Where the Gemini credential comes from. Resolved on every analysis so a
/// rotated or late-provisioned key is picked up without a restart.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    Env(String),
    Fixed(Option<String>),
}

impl ApiKeySource {
    pub fn resolve(&self) -> Option<String> {
        let raw = match self {
            ApiKeySource::Env(name) => std::env::var(name).ok(),
            ApiKeySource::Fixed(key) => key.clone(),
        }?;
        let key = raw.trim();
        if key.is_empty() || UNSET_SENTINELS.iter().any(|s| key.eq_ignore_ascii_case(s)) {
            return None;
        }
        Some(key.to_string())
    }

    /// Name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            ApiKeySource::Env(name) => name,
            ApiKeySource::Fixed(_) => DEFAULT_KEY_VAR,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = env_opt("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        validate_url(&api_url)?;

        let bind = env_opt("RANKKV_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind = bind.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("RANKKV_BIND must be a socket address, got {bind:?}"))
        })?;

        Ok(Self {
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            api_key: ApiKeySource::Env(DEFAULT_KEY_VAR.into()),
            model: env_opt("RANKKV_MODEL").map(|m| m.trim().to_string()).unwrap_or_else(|| DEFAULT_MODEL.into()),
            retry_max_attempts: env_u32_range("RANKKV_RETRY_MAX_ATTEMPTS", 3, 1, 3)?,
            retry_base_delay_ms: env_u64_range("RANKKV_RETRY_BASE_DELAY_MS", 1000, 0, 60_000)?,
            request_timeout: env_u64_range("RANKKV_REQUEST_TIMEOUT", 60, 1, 600)?,
            analyze_timeout: env_u64_range("RANKKV_ANALYZE_TIMEOUT", 180, 1, 1800)?,
            bind,
        })
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn mask_api_key(&self) -> String {
        match self.api_key.resolve() {
            Some(key) => mask_key(&key),
            None => "(not configured)".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            api_key: ApiKeySource::Env(DEFAULT_KEY_VAR.into()),
            model: DEFAULT_MODEL.into(),
            retry_max_attempts: 3,
            retry_base_delay_ms: 1000,
            request_timeout: 60,
            analyze_timeout: 180,
            bind: ([0, 0, 0, 0], 3000).into(),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_u32_range(name: &str, default: u32, min: u32, max: u32) -> Result<u32> {
    let Some(raw) = env_opt(name) else { return Ok(default) };
    parse_range(name, raw.trim(), min, max)
}

fn env_u64_range(name: &str, default: u64, min: u64, max: u64) -> Result<u64> {
    let Some(raw) = env_opt(name) else { return Ok(default) };
    parse_range(name, raw.trim(), min, max)
}

fn parse_range<T>(name: &str, raw: &str, min: T, max: T) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let invalid = || ConfigError::Invalid(format!("{name} must be an integer between {min} and {max}"));
    let val: T = raw.parse().map_err(|_| invalid())?;
    if val < min || val > max {
        return Err(invalid());
    }
    Ok(val)
}

fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Invalid("GEMINI_API_URL must be a valid http or https URL".into()));
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= 8 {
        return "********".into();
    }
    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{first}********{last}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_keys_resolve_to_none() {
        for raw in ["", "   ", "undefined", "NULL"] {
            let source = ApiKeySource::Fixed(Some(raw.into()));
            assert!(source.resolve().is_none(), "{raw:?} should be treated as unset");
        }
        assert!(ApiKeySource::Fixed(None).resolve().is_none());
    }

    #[test]
    fn real_key_is_trimmed() {
        let source = ApiKeySource::Fixed(Some("  AIza-test-key \n".into()));
        assert_eq!(source.resolve().as_deref(), Some("AIza-test-key"));
    }

    #[test]
    fn env_source_reports_variable_name() {
        let source = ApiKeySource::Env("RANKKV_TEST_KEY_THAT_IS_NEVER_SET".into());
        assert_eq!(source.name(), "RANKKV_TEST_KEY_THAT_IS_NEVER_SET");
        assert!(source.resolve().is_none());
    }

    #[test]
    fn parse_range_bounds() {
        assert_eq!(parse_range::<u32>("X", "2", 1, 3).unwrap(), 2);
        assert!(parse_range::<u32>("X", "4", 1, 3).is_err());
        assert!(parse_range::<u64>("X", "abc", 0, 10).is_err());
    }

    #[test]
    fn masks_long_keys_only_partially() {
        assert_eq!(mask_key("short"), "********");
        assert_eq!(mask_key("AIzaSyABCDEFGHwxyz"), "AIza********wxyz");
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url(DEFAULT_API_URL).is_ok());
    }
}
