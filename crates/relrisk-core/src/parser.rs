//! Strict parsing of raw model output into a [`CandidateAssessment`].
//!
//! The parser never coerces: a decision outside `GO`/`NO_GO`, a score that
//! is not a JSON number or lies outside `[0, 1]`, or a malformed list is a
//! [`ParseError`]. The only leniency is stripping one surrounding Markdown
//! code fence.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{CandidateAssessment, Decision, ParseError, RiskFactor, RiskLevel};

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\s*```\z").expect("valid fence regex")
});

const REQUIRED_FIELDS: &[&str] = &[
    "decision",
    "risk_score",
    "risk_factors",
    "recommended_actions",
];

/// Remove a single surrounding code fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => trimmed,
    }
}

/// Parse raw model text into a candidate assessment.
pub fn parse_candidate(raw: &str) -> Result<CandidateAssessment, ParseError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| ParseError::InvalidJson {
        message: e.to_string(),
    })?;
    let obj = value.as_object().ok_or(ParseError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(*field) {
            return Err(ParseError::MissingField {
                field: (*field).to_string(),
            });
        }
    }

    let decision = parse_decision(&obj["decision"])?;
    let risk_score = parse_score(&obj["risk_score"])?;

    if let Some(level) = obj.get("risk_level") {
        parse_level(level, "risk_level")?;
    }

    let risk_factors = parse_factors(&obj["risk_factors"], risk_score)?;
    let recommended_actions = string_list(&obj["recommended_actions"], "recommended_actions")?;
    let conditions = match obj.get("conditions") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => string_list(v, "conditions")?,
    };
    let summary = optional_string(obj, "summary")?;
    let explanation = optional_string(obj, "explanation")?;

    if decision == Decision::NoGo && risk_factors.is_empty() {
        return Err(ParseError::UnexplainedNoGo);
    }

    Ok(CandidateAssessment {
        decision,
        risk_score,
        risk_factors,
        recommended_actions,
        summary,
        explanation,
        conditions,
    })
}

fn parse_decision(value: &Value) -> Result<Decision, ParseError> {
    match value.as_str() {
        Some("GO") => Ok(Decision::Go),
        Some("NO_GO") => Ok(Decision::NoGo),
        Some(other) => Err(ParseError::InvalidDecision {
            value: other.to_string(),
        }),
        None => Err(ParseError::InvalidDecision {
            value: value.to_string(),
        }),
    }
}

fn parse_score(value: &Value) -> Result<f64, ParseError> {
    let score = value.as_f64().ok_or_else(|| ParseError::NonNumericScore {
        value: value.to_string(),
    })?;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(ParseError::ScoreOutOfRange { value: score });
    }
    Ok(score)
}

fn parse_level(value: &Value, field: &str) -> Result<RiskLevel, ParseError> {
    let invalid = || ParseError::InvalidRiskLevel {
        value: value.to_string(),
    };
    let s = value.as_str().ok_or_else(invalid)?;
    serde_json::from_value(Value::String(s.to_string())).map_err(|_| {
        if field == "risk_level" {
            invalid()
        } else {
            ParseError::MalformedField {
                field: field.to_string(),
                reason: format!("invalid severity {s:?}"),
            }
        }
    })
}

fn parse_factors(value: &Value, score: f64) -> Result<Vec<RiskFactor>, ParseError> {
    let items = value.as_array().ok_or_else(|| malformed("risk_factors", "expected an array"))?;
    let default_severity = RiskLevel::from_score(score);

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(RiskFactor::new("general", s.clone(), default_severity)),
            Value::Object(map) => {
                let description = map
                    .get("description")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        malformed("risk_factors", &format!("item {i} has no string description"))
                    })?;
                let category = match map.get("category") {
                    None | Some(Value::Null) => "general",
                    Some(Value::String(c)) => c.as_str(),
                    Some(_) => {
                        return Err(malformed(
                            "risk_factors",
                            &format!("item {i} category must be a string"),
                        ))
                    }
                };
                let severity = match map.get("severity") {
                    None | Some(Value::Null) => default_severity,
                    Some(v) => parse_level(v, "risk_factors")?,
                };
                Ok(RiskFactor::new(category, description, severity))
            }
            _ => Err(malformed(
                "risk_factors",
                &format!("item {i} must be a string or an object"),
            )),
        })
        .collect()
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>, ParseError> {
    let items = value.as_array().ok_or_else(|| malformed(field, "expected an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(field, &format!("item {i} is not a string")))
        })
        .collect()
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Result<String, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(malformed(field, "expected a string")),
    }
}

fn malformed(field: &str, reason: &str) -> ParseError {
    ParseError::MalformedField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_string_factor_takes_score_severity() {
        let c = parse_candidate(
            r#"{"decision":"GO","risk_score":0.45,"risk_factors":["touches billing"],"recommended_actions":[]}"#,
        )
        .unwrap();
        assert_eq!(c.risk_factors[0].category, "general");
        assert_eq!(c.risk_factors[0].severity, RiskLevel::Medium);
    }

    #[test]
    fn test_integer_score_accepted() {
        let c = parse_candidate(
            r#"{"decision":"NO_GO","risk_score":1,"risk_factors":["x"],"recommended_actions":[]}"#,
        )
        .unwrap();
        assert_eq!(c.risk_score, 1.0);
    }

    #[test]
    fn test_bad_factor_severity() {
        let err = parse_candidate(
            r#"{"decision":"GO","risk_score":0.1,"risk_factors":[{"description":"d","severity":"SEVERE"}],"recommended_actions":[]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedField { ref field, .. } if field == "risk_factors"));
    }
}
