//! Turns raw model text into a typed [`AnalysisResult`].
//!
//! Nothing untyped leaves this module: the text is deserialized into strict
//! wire structs, every numeric range and array length is checked, and only
//! then converted. Any failure is `UpstreamError::Malformed`.

use super::model::{
    AnalysisResult, Intent, KeywordCluster, PlatformScore, RelatedKeyword, TrendPoint,
};
use super::{CLUSTER_COUNT, MAX_RELATED, TREND_MONTHS};
use crate::error::UpstreamError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    keyword: String,
    volume: f64,
    cpc: f64,
    competition: f64,
    intent: Intent,
    summary: String,
    confidence_score: f64,
    platform_comparison: Vec<PlatformScore>,
    trend: Vec<RawTrendPoint>,
    related: Vec<RawRelated>,
    clusters: Vec<KeywordCluster>,
}

#[derive(Debug, Deserialize)]
struct RawTrendPoint {
    month: String,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct RawRelated {
    keyword: String,
    volume: f64,
    cpc: f64,
    competition: f64,
    intent: Intent,
}

/// Parses and validates model output. `sources` is left empty for the caller to fill.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, UpstreamError> {
    let body = strip_fences(text);
    if body.is_empty() {
        return Err(malformed("empty response"));
    }

    let raw: RawAnalysis =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    check_len("trend", raw.trend.len(), TREND_MONTHS, TREND_MONTHS)?;
    check_len("related", raw.related.len(), 0, MAX_RELATED)?;
    check_len("clusters", raw.clusters.len(), CLUSTER_COUNT, CLUSTER_COUNT)?;

    let trend = raw
        .trend
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            Ok(TrendPoint {
                volume: whole("trend", i, "volume", p.volume)?,
                month: p.month,
            })
        })
        .collect::<Result<Vec<_>, UpstreamError>>()?;

    let related = raw
        .related
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(RelatedKeyword {
                volume: whole("related", i, "volume", r.volume)?,
                cpc: non_negative("related", i, "cpc", r.cpc)?,
                competition: unit("related", i, "competition", r.competition)?,
                keyword: r.keyword,
                intent: r.intent,
            })
        })
        .collect::<Result<Vec<_>, UpstreamError>>()?;

    for (i, score) in raw.platform_comparison.iter().enumerate() {
        finite("platformComparison", Some(i), "score", score.score)?;
    }

    Ok(AnalysisResult {
        volume: whole_field("volume", raw.volume)?,
        cpc: non_negative_field("cpc", raw.cpc)?,
        competition: unit_field("competition", raw.competition)?,
        confidence_score: finite("confidenceScore", None, "", raw.confidence_score)?,
        keyword: raw.keyword,
        intent: raw.intent,
        summary: raw.summary,
        platform_comparison: raw.platform_comparison,
        trend,
        related,
        clusters: raw.clusters,
        sources: Vec::new(),
    })
}

/// Tolerates a ```json fence around the payload.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn malformed(msg: impl Into<String>) -> UpstreamError {
    UpstreamError::Malformed(msg.into())
}

fn check_len(field: &str, len: usize, min: usize, max: usize) -> Result<(), UpstreamError> {
    if len < min || len > max {
        let expected = if min == max { format!("exactly {min}") } else { format!("at most {max}") };
        return Err(malformed(format!("{field} must have {expected} entries, got {len}")));
    }
    Ok(())
}

fn path(field: &str, index: Option<usize>, sub: &str) -> String {
    match index {
        Some(i) if sub.is_empty() => format!("{field}[{i}]"),
        Some(i) => format!("{field}[{i}].{sub}"),
        None => field.to_string(),
    }
}

fn finite(field: &str, index: Option<usize>, sub: &str, v: f64) -> Result<f64, UpstreamError> {
    if !v.is_finite() {
        return Err(malformed(format!("{} must be a finite number", path(field, index, sub))));
    }
    Ok(v)
}

fn non_negative(field: &str, i: usize, sub: &str, v: f64) -> Result<f64, UpstreamError> {
    check_non_negative(path(field, Some(i), sub), v)
}

fn non_negative_field(field: &str, v: f64) -> Result<f64, UpstreamError> {
    check_non_negative(field.to_string(), v)
}

fn check_non_negative(name: String, v: f64) -> Result<f64, UpstreamError> {
    if !v.is_finite() || v < 0.0 {
        return Err(malformed(format!("{name} must be a non-negative number, got {v}")));
    }
    Ok(v)
}

fn unit(field: &str, i: usize, sub: &str, v: f64) -> Result<f64, UpstreamError> {
    check_unit(path(field, Some(i), sub), v)
}

fn unit_field(field: &str, v: f64) -> Result<f64, UpstreamError> {
    check_unit(field.to_string(), v)
}

fn check_unit(name: String, v: f64) -> Result<f64, UpstreamError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(malformed(format!("{name} must be between 0 and 1, got {v}")));
    }
    Ok(v)
}

fn whole(field: &str, i: usize, sub: &str, v: f64) -> Result<u64, UpstreamError> {
    check_whole(path(field, Some(i), sub), v)
}

fn whole_field(field: &str, v: f64) -> Result<u64, UpstreamError> {
    check_whole(field.to_string(), v)
}

const WHOLE_TOLERANCE: f64 = 1e-6;

// Only float noise around an integer is accepted; 40000.0 passes, 40000.4 does not.
fn check_whole(name: String, v: f64) -> Result<u64, UpstreamError> {
    if !v.is_finite() || v < 0.0 || v >= u64::MAX as f64 || (v - v.round()).abs() > WHOLE_TOLERANCE {
        return Err(malformed(format!("{name} must be a non-negative integer, got {v}")));
    }
    Ok(v.round() as u64)
}
