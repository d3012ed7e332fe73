//! Strict parsing of model output.

use relrisk_core::{parse_candidate, Decision, ParseError, RiskLevel};

const VALID: &str = r#"{
    "decision": "GO",
    "risk_score": 0.35,
    "risk_level": "MEDIUM",
    "summary": "Adds request logging",
    "risk_factors": [
        {"category": "observability", "description": "log volume increase", "severity": "LOW"},
        "touches request path"
    ],
    "explanation": "Small, well-tested change.",
    "conditions": ["watch log ingestion costs"],
    "recommended_actions": ["monitor p99 latency"]
}"#;

#[test]
fn test_parses_full_response() {
    let c = parse_candidate(VALID).unwrap();
    assert_eq!(c.decision, Decision::Go);
    assert_eq!(c.risk_score, 0.35);
    assert_eq!(c.risk_factors.len(), 2);
    assert_eq!(c.risk_factors[0].category, "observability");
    assert_eq!(c.risk_factors[0].severity, RiskLevel::Low);
    assert_eq!(c.risk_factors[1].category, "general");
    assert_eq!(c.risk_factors[1].severity, RiskLevel::Medium);
    assert_eq!(c.recommended_actions, vec!["monitor p99 latency"]);
    assert_eq!(c.conditions, vec!["watch log ingestion costs"]);
    assert_eq!(c.summary, "Adds request logging");
}

#[test]
fn test_parses_fenced_response() {
    let fenced = format!("```json\n{VALID}\n```");
    assert_eq!(parse_candidate(&fenced).unwrap(), parse_candidate(VALID).unwrap());
}

#[test]
fn test_minimal_response_defaults_optional_fields() {
    let c = parse_candidate(
        r#"{"decision":"GO","risk_score":0.0,"risk_factors":[],"recommended_actions":[]}"#,
    )
    .unwrap();
    assert!(c.summary.is_empty());
    assert!(c.conditions.is_empty());
}

#[test]
fn test_rejects_non_json() {
    let err = parse_candidate("Looks fine to me, ship it!").unwrap_err();
    assert!(matches!(err, ParseError::InvalidJson { .. }));
}

#[test]
fn test_rejects_non_object() {
    assert_eq!(parse_candidate("[1, 2]").unwrap_err(), ParseError::NotAnObject);
}

#[test]
fn test_rejects_each_missing_required_field() {
    for field in ["decision", "risk_score", "risk_factors", "recommended_actions"] {
        let mut value: serde_json::Value = serde_json::from_str(VALID).unwrap();
        value.as_object_mut().unwrap().remove(field);
        let err = parse_candidate(&value.to_string()).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingField {
                field: field.to_string()
            }
        );
    }
}

#[test]
fn test_rejects_decision_outside_enumeration() {
    for bad in [r#""MAYBE""#, r#""go""#, r#""No-Go""#, "true", "1"] {
        let raw = format!(
            r#"{{"decision":{bad},"risk_score":0.2,"risk_factors":[],"recommended_actions":[]}}"#
        );
        let err = parse_candidate(&raw).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDecision { .. }), "{bad}: {err:?}");
    }
}

#[test]
fn test_rejects_score_out_of_range_without_clamping() {
    for bad in ["1.01", "-0.1", "42"] {
        let raw = format!(
            r#"{{"decision":"GO","risk_score":{bad},"risk_factors":[],"recommended_actions":[]}}"#
        );
        let err = parse_candidate(&raw).unwrap_err();
        assert!(matches!(err, ParseError::ScoreOutOfRange { .. }), "{bad}: {err:?}");
    }
}

#[test]
fn test_rejects_non_numeric_score() {
    for bad in [r#""0.4""#, "null", "[0.4]", r#""high""#] {
        let raw = format!(
            r#"{{"decision":"GO","risk_score":{bad},"risk_factors":[],"recommended_actions":[]}}"#
        );
        let err = parse_candidate(&raw).unwrap_err();
        assert!(matches!(err, ParseError::NonNumericScore { .. }), "{bad}: {err:?}");
    }
}

#[test]
fn test_rejects_malformed_lists() {
    let cases = [
        (r#""risk_factors":"none","recommended_actions":[]"#, "risk_factors"),
        (r#""risk_factors":[42],"recommended_actions":[]"#, "risk_factors"),
        (r#""risk_factors":[{"category":"x"}],"recommended_actions":[]"#, "risk_factors"),
        (r#""risk_factors":[],"recommended_actions":"deploy""#, "recommended_actions"),
        (r#""risk_factors":[],"recommended_actions":[1, 2]"#, "recommended_actions"),
        (r#""risk_factors":[],"recommended_actions":[],"conditions":{}"#, "conditions"),
    ];
    for (fields, expected_field) in cases {
        let raw = format!(r#"{{"decision":"GO","risk_score":0.2,{fields}}}"#);
        let err = parse_candidate(&raw).unwrap_err();
        assert!(
            matches!(&err, ParseError::MalformedField { field, .. } if field == expected_field),
            "{raw}: {err:?}"
        );
    }
}

#[test]
fn test_rejects_invalid_risk_level() {
    let err = parse_candidate(
        r#"{"decision":"GO","risk_score":0.2,"risk_level":"EXTREME","risk_factors":[],"recommended_actions":[]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::InvalidRiskLevel { .. }));
}

#[test]
fn test_rejects_unexplained_no_go() {
    let err = parse_candidate(
        r#"{"decision":"NO_GO","risk_score":0.8,"risk_factors":[],"recommended_actions":["hold"]}"#,
    )
    .unwrap_err();
    assert_eq!(err, ParseError::UnexplainedNoGo);
}

#[test]
fn test_rejects_non_string_summary() {
    let err = parse_candidate(
        r#"{"decision":"GO","risk_score":0.2,"risk_factors":[],"recommended_actions":[],"summary":7}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::MalformedField { ref field, .. } if field == "summary"));
}
