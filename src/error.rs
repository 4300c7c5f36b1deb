use thiserror::Error;

/// Startup configuration problems. Reported once, before any surface is served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration invalid: {0}")]
    Invalid(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure of a single upstream attempt. Never leaves the `analysis` module;
/// the orchestrator folds it into an [`AnalyzeError`].
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("upstream rejected the API key: {0}")]
    InvalidCredential(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UpstreamError::InvalidCredential(_))
    }
}

/// The one error a caller of `Analyzer::analyze` ever sees.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}. Check your deployment's environment configuration.")]
    Configuration(String),

    #[error("{0} was rejected by the analysis engine. Check your deployment's environment configuration.")]
    CredentialRejected(String),

    #[error("RankKV analysis service is temporarily at capacity. Please retry shortly.")]
    RateLimited { attempts: u32 },

    #[error("RankKV engine returned unusable data. Please try again. ({detail})")]
    MalformedResponse { attempts: u32, detail: String },

    #[error("{message}")]
    Transport { attempts: u32, message: String },
}

impl AnalyzeError {
    pub(crate) fn missing_key(key_var: &str) -> Self {
        AnalyzeError::Configuration(format!("{key_var} is not configured"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzeError::InvalidRequest(_) => "invalid_request",
            AnalyzeError::Configuration(_) | AnalyzeError::CredentialRejected(_) => "configuration",
            AnalyzeError::RateLimited { .. } => "rate_limited",
            AnalyzeError::MalformedResponse { .. } => "malformed_response",
            AnalyzeError::Transport { .. } => "transport",
        }
    }

    /// Number of upstream calls made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            AnalyzeError::InvalidRequest(_) | AnalyzeError::Configuration(_) => 0,
            AnalyzeError::CredentialRejected(_) => 1,
            AnalyzeError::RateLimited { attempts }
            | AnalyzeError::MalformedResponse { attempts, .. }
            | AnalyzeError::Transport { attempts, .. } => *attempts,
        }
    }

    pub(crate) fn from_upstream(err: UpstreamError, attempts: u32, key_var: &str) -> Self {
        match err {
            UpstreamError::RateLimited { .. } => AnalyzeError::RateLimited { attempts },
            UpstreamError::InvalidCredential(_) => AnalyzeError::CredentialRejected(key_var.to_string()),
            UpstreamError::Malformed(detail) => AnalyzeError::MalformedResponse { attempts, detail },
            other => AnalyzeError::Transport { attempts, message: other.to_string() },
        }
    }
}

pub type Result<T, E = AnalyzeError> = std::result::Result<T, E>;
