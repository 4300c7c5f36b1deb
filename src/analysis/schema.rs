//! Structured-output schema declared to the model.
//!
//! Uses the OpenAPI subset Gemini accepts for `generationConfig.responseSchema`.
//! The same constraints are re-checked locally in `validate`.

use super::model::Intent;
use super::{CLUSTER_COUNT, MAX_RELATED, TREND_MONTHS};
use serde_json::{Value, json};

pub fn response_schema() -> Value {
    let intents: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
    let intent = json!({ "type": "STRING", "format": "enum", "enum": intents });

    json!({
        "type": "OBJECT",
        "properties": {
            "keyword": { "type": "STRING" },
            "volume": { "type": "INTEGER" },
            "cpc": { "type": "NUMBER" },
            "competition": { "type": "NUMBER" },
            "intent": intent,
            "summary": { "type": "STRING" },
            "confidenceScore": { "type": "NUMBER" },
            "platformComparison": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "platform": { "type": "STRING" },
                        "score": { "type": "NUMBER" }
                    },
                    "required": ["platform", "score"]
                }
            },
            "trend": {
                "type": "ARRAY",
                "minItems": TREND_MONTHS,
                "maxItems": TREND_MONTHS,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "month": { "type": "STRING" },
                        "volume": { "type": "INTEGER" }
                    },
                    "required": ["month", "volume"]
                }
            },
            "related": {
                "type": "ARRAY",
                "maxItems": MAX_RELATED,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "keyword": { "type": "STRING" },
                        "volume": { "type": "INTEGER" },
                        "cpc": { "type": "NUMBER" },
                        "competition": { "type": "NUMBER" },
                        "intent": intent
                    },
                    "required": ["keyword", "volume", "cpc", "competition", "intent"]
                }
            },
            "clusters": {
                "type": "ARRAY",
                "minItems": CLUSTER_COUNT,
                "maxItems": CLUSTER_COUNT,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "keywords": { "type": "ARRAY", "items": { "type": "STRING" } }
                    },
                    "required": ["name", "keywords"]
                }
            }
        },
        "required": [
            "keyword", "volume", "cpc", "competition", "trend", "related",
            "summary", "intent", "clusters", "platformComparison", "confidenceScore"
        ]
    })
}
