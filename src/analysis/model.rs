use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_COUNTRY: &str = "US";
pub const DEFAULT_LANGUAGE: &str = "en";

/// One keyword-research submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub query: String,
    pub country: String,
    pub language: String,
    pub platform: Platform,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl SearchConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            country: DEFAULT_COUNTRY.into(),
            language: DEFAULT_LANGUAGE.into(),
            platform: Platform::Google,
            location: None,
        }
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Region code, stored uppercase ("us" becomes "US").
    pub fn country(mut self, country: impl AsRef<str>) -> Self {
        self.country = country.as_ref().trim().to_uppercase();
        self
    }

    /// Language code, stored lowercase.
    pub fn language(mut self, language: impl AsRef<str>) -> Self {
        self.language = language.as_ref().trim().to_lowercase();
        self
    }

    pub fn location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(GeoPoint { lat, lng });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCategory {
    SearchEngine,
    VideoSocial,
    Commerce,
    AiAnswer,
    Specialty,
}

impl PlatformCategory {
    pub fn label(self) -> &'static str {
        match self {
            PlatformCategory::SearchEngine => "Search Engines",
            PlatformCategory::VideoSocial => "Video & Social",
            PlatformCategory::Commerce => "E-commerce & Apps",
            PlatformCategory::AiAnswer => "AI & Emerging",
            PlatformCategory::Specialty => "Specialty & Professional",
        }
    }
}

macro_rules! platforms {
    ($($variant:ident => $name:literal, $category:ident;)+) => {
        /// Channels a keyword can be researched for.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Platform {
            $($variant,)+
        }

        impl Platform {
            pub const ALL: &'static [Platform] = &[$(Platform::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Platform::$variant => $name,)+
                }
            }

            pub fn category(self) -> PlatformCategory {
                match self {
                    $(Platform::$variant => PlatformCategory::$category,)+
                }
            }

            fn ident(self) -> &'static str {
                match self {
                    $(Platform::$variant => stringify!($variant),)+
                }
            }
        }
    };
}

platforms! {
    Google => "Google", SearchEngine;
    Bing => "Bing", SearchEngine;
    Yahoo => "Yahoo", SearchEngine;
    Baidu => "Baidu", SearchEngine;
    Naver => "Naver", SearchEngine;
    DuckDuckGo => "DuckDuckGo", SearchEngine;
    YouTube => "YouTube", VideoSocial;
    TikTok => "TikTok", VideoSocial;
    Instagram => "Instagram", VideoSocial;
    X => "X (Twitter)", VideoSocial;
    Pinterest => "Pinterest", VideoSocial;
    Facebook => "Facebook", VideoSocial;
    Triller => "Triller", VideoSocial;
    Likee => "Likee", VideoSocial;
    Amazon => "Amazon", Commerce;
    EBay => "eBay", Commerce;
    Etsy => "Etsy", Commerce;
    AppStore => "App Store", Commerce;
    PlayStore => "Play Store", Commerce;
    Shopify => "Shopify", Commerce;
    Perplexity => "Perplexity AI", AiAnswer;
    ChatGpt => "ChatGPT", AiAnswer;
    BingAi => "Bing AI", AiAnswer;
    YouCom => "You.com", AiAnswer;
    Reddit => "Reddit", Specialty;
    Quora => "Quora", Specialty;
    LinkedIn => "LinkedIn", Specialty;
    Medium => "Medium", Specialty;
    Spotify => "Spotify", Specialty;
    AppleMusic => "Apple Music", Specialty;
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Letters and digits only, lowercased: "App Store", "app_store" and
/// "AppStore" all normalize to "appstore".
fn normalize(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        if wanted.is_empty() {
            return Err("Platform cannot be empty".into());
        }
        Platform::ALL
            .iter()
            .copied()
            .find(|p| normalize(p.name()) == wanted || normalize(p.ident()) == wanted)
            // "Twitter" on its own is how most people still name X.
            .or_else(|| (wanted == "twitter").then_some(Platform::X))
            .ok_or_else(|| format!("Unsupported platform: {}", s.trim()))
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intent {
    Informational,
    Transactional,
    Commercial,
    Navigational,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::Informational,
        Intent::Transactional,
        Intent::Commercial,
        Intent::Navigational,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Informational => "Informational",
            Intent::Transactional => "Transactional",
            Intent::Commercial => "Commercial",
            Intent::Navigational => "Navigational",
        }
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown intent {s:?}"))
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformScore {
    pub platform: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub month: String,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedKeyword {
    pub keyword: String,
    pub volume: u64,
    pub cpc: f64,
    pub competition: f64,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCluster {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// A validated keyword analysis, as handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub keyword: String,
    pub volume: u64,
    pub cpc: f64,
    pub competition: f64,
    pub intent: Intent,
    pub summary: String,
    pub confidence_score: f64,
    pub platform_comparison: Vec<PlatformScore>,
    pub trend: Vec<TrendPoint>,
    pub related: Vec<RelatedKeyword>,
    pub clusters: Vec<KeywordCluster>,
    pub sources: Vec<GroundingSource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_and_language_codes_normalised() {
        let config = SearchConfig::new("shoes").country(" de ").language("DE");
        assert_eq!(config.country, "DE");
        assert_eq!(config.language, "de");
    }

    #[test]
    fn platform_count() {
        assert_eq!(Platform::ALL.len(), 30);
    }

    #[test]
    fn platform_parses_display_and_ident() {
        assert_eq!("Google".parse::<Platform>().unwrap(), Platform::Google);
        assert_eq!("X (Twitter)".parse::<Platform>().unwrap(), Platform::X);
        assert_eq!("twitter".parse::<Platform>().unwrap(), Platform::X);
        assert_eq!("app_store".parse::<Platform>().unwrap(), Platform::AppStore);
        assert_eq!("Perplexity AI".parse::<Platform>().unwrap(), Platform::Perplexity);
        assert_eq!("you.com".parse::<Platform>().unwrap(), Platform::YouCom);
        assert_eq!("bing ai".parse::<Platform>().unwrap(), Platform::BingAi);
        assert_eq!("Bing".parse::<Platform>().unwrap(), Platform::Bing);
    }

    #[test]
    fn platform_names_are_unique_after_normalizing() {
        let mut seen = std::collections::HashSet::new();
        for p in Platform::ALL {
            assert!(seen.insert(normalize(p.name())), "duplicate name for {p:?}");
        }
    }

    #[test]
    fn unknown_platform_rejected() {
        let err = "Myspace".parse::<Platform>().unwrap_err();
        assert_eq!(err, "Unsupported platform: Myspace");
        assert!("  ".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_serializes_as_display_name() {
        let json = serde_json::to_string(&Platform::PlayStore).unwrap();
        assert_eq!(json, "\"Play Store\"");
    }

    #[test]
    fn intent_is_case_insensitive() {
        let intent: Intent = serde_json::from_str("\"commercial\"").unwrap();
        assert_eq!(intent, Intent::Commercial);
        assert!(serde_json::from_str::<Intent>("\"Curious\"").is_err());
        assert_eq!(serde_json::to_string(&Intent::Navigational).unwrap(), "\"Navigational\"");
    }

    #[test]
    fn search_config_defaults() {
        let config = SearchConfig::new("coffee");
        assert_eq!(config.platform, Platform::Google);
        assert_eq!(config.country, "US");
        assert_eq!(config.language, "en");
        assert!(config.location.is_none());
    }
}
