//! Response parsing and validation
//!
//! Turns free-form model output into an `AnalysisResult`. Every field is
//! validated on its own; only a missing or unknown `riskLevel` is fatal.

use once_cell::sync::Lazy;
use regex::Regex;
use scamguard_core::{
    clamp_confidence, truncate_chars, AnalysisResult, ApiError, RiskLevel, SuspiciousPassage,
    ThreatKind, DEFAULT_CONFIDENCE, MAX_PASSAGES, MAX_PASSAGE_CHARS, PLACEHOLDER_EXPLANATION,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Language tag at the start of a fenced block.
static FENCE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?i:json)\b").expect("Invalid fence tag regex"));

const FENCE: &str = "```";

/// Parse raw model output into a validated result.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, ApiError> {
    let candidate = extract_json_block(raw);
    let value: Value = serde_json::from_str(candidate).map_err(|e| {
        ApiError::invalid_response(format!("model output is not valid JSON: {}", e))
    })?;
    validate(&value)
}

/// Contents of the innermost fenced block if there is one, else the
/// trimmed text.
///
/// A block whose body opens like JSON wins over one that does not.
pub fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    let segments: Vec<&str> = trimmed.split(FENCE).collect();
    if segments.len() < 3 {
        return trimmed;
    }

    let mut fallback = None;
    for &segment in &segments[1..segments.len() - 1] {
        let body = strip_fence_tag(segment).trim();
        if body.is_empty() {
            continue;
        }
        if body.starts_with('{') || body.starts_with('[') {
            return body;
        }
        fallback.get_or_insert(body);
    }
    fallback.unwrap_or(trimmed)
}

fn strip_fence_tag(segment: &str) -> &str {
    match FENCE_TAG.find(segment) {
        Some(tag) => &segment[tag.end()..],
        None => segment,
    }
}

/// Validate a parsed JSON value.
pub fn validate(value: &Value) -> Result<AnalysisResult, ApiError> {
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::invalid_response("model output is not a JSON object"))?;

    let risk_level = object
        .get("riskLevel")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::invalid_response("model output has no riskLevel"))
        .and_then(|raw| {
            RiskLevel::from_wire_str(raw).map_err(|e| ApiError::invalid_response(e.to_string()))
        })?;

    let confidence = confidence_of(object.get("confidence")).unwrap_or(DEFAULT_CONFIDENCE);

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(PLACEHOLDER_EXPLANATION);

    let mut result = AnalysisResult::new(risk_level, explanation, confidence)
        .with_threats(threat_tags(object.get("threats")));

    if let Some(passages) = object.get("suspiciousPassages").and_then(Value::as_array) {
        let parent = result.confidence;
        result = result.with_passages(passages_of(passages, parent));
    }

    Ok(result)
}

fn confidence_of(value: Option<&Value>) -> Option<f32> {
    value.and_then(Value::as_f64).map(|c| clamp_confidence(c as f32))
}

/// Recognized tags only; anything else in the array is dropped.
fn threat_tags(value: Option<&Value>) -> BTreeSet<ThreatKind> {
    value
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .filter_map(ThreatKind::from_tag)
                .collect()
        })
        .unwrap_or_default()
}

fn passages_of(entries: &[Value], parent_confidence: f32) -> Vec<SuspiciousPassage> {
    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| passage_of(entry, parent_confidence))
        .take(MAX_PASSAGES)
        .collect()
}

fn passage_of(entry: &Map<String, Value>, parent_confidence: f32) -> Option<SuspiciousPassage> {
    let text = entry
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())?;

    let reason = entry.get("reason").and_then(Value::as_str).unwrap_or_default();

    Some(SuspiciousPassage {
        text: truncate_chars(text, MAX_PASSAGE_CHARS),
        labels: threat_tags(entry.get("labels")),
        confidence: confidence_of(entry.get("confidence")).unwrap_or(parent_confidence),
        reason: truncate_chars(reason.trim(), MAX_PASSAGE_CHARS),
    })
}


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
