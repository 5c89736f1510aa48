use crate::calc;
use crate::ipc::error::{bad_params, ok};
use crate::ipc::types::{AppState, Request};
use crate::letters;
use crate::model::{lenient_number, Assignment, AssignmentGroup, GradeCutoff};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;

fn parse_array<T: DeserializeOwned>(
    req: &Request,
    key: &str,
    raw: &serde_json::Value,
) -> Result<Vec<T>, serde_json::Value> {
    if !raw.is_array() {
        return Err(bad_params(&req.id, format!("{} must be an array", key)));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| bad_params(&req.id, format!("invalid {}: {}", key, e)))
}

fn required_array<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Vec<T>, serde_json::Value> {
    match req.params.get(key) {
        Some(raw) if !raw.is_null() => parse_array(req, key, raw),
        _ => Err(bad_params(&req.id, format!("missing {}", key))),
    }
}

fn optional_array<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Option<Vec<T>>, serde_json::Value> {
    match req.params.get(key) {
        Some(raw) if !raw.is_null() => parse_array(req, key, raw).map(Some),
        _ => Ok(None),
    }
}

fn groups_param(req: &Request) -> Result<Vec<AssignmentGroup>, serde_json::Value> {
    Ok(optional_array(req, "groups")?.unwrap_or_default())
}

fn cutoffs_param(state: &AppState, req: &Request) -> Result<Vec<GradeCutoff>, serde_json::Value> {
    Ok(optional_array(req, "cutoffs")?.unwrap_or_else(|| state.config.default_cutoffs.clone()))
}

fn handle_effective_weight(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let assignment: Assignment = match req.params.get("assignment") {
        Some(raw) if raw.is_object() => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return bad_params(&req.id, format!("invalid assignment: {}", e)),
        },
        _ => return bad_params(&req.id, "missing assignment object"),
    };
    let assignments: Vec<Assignment> = match required_array(req, "assignments") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match groups_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let weight = calc::effective_weight(&assignment, &assignments, &groups);
    ok(&req.id, json!({ "weight": weight }))
}

fn handle_overall_percentage(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let assignments: Vec<Assignment> = match required_array(req, "assignments") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match groups_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let percentage = calc::overall_percentage(&assignments, &groups);
    ok(&req.id, json!({ "percentage": percentage }))
}

fn handle_letter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let percentage = req.params.get("percentage").and_then(lenient_number);
    let cutoffs = match cutoffs_param(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let letter = letters::letter_grade_with(percentage, &cutoffs, &state.config.letter_policy());
    ok(&req.id, json!({ "letter": letter }))
}

fn handle_course_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let assignments: Vec<Assignment> = match required_array(req, "assignments") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match groups_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cutoffs = match cutoffs_param(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let summary = calc::course_summary(&assignments, &groups, &cutoffs, &state.config);
    if !summary.warnings.is_empty() {
        tracing::debug!(id = %req.id, warnings = summary.warnings.len(), "course summary warnings");
    }
    ok(&req.id, json!(summary))
}

fn parse_overrides(req: &Request) -> Result<BTreeMap<String, Option<f64>>, serde_json::Value> {
    let Some(obj) = req.params.get("overrides").and_then(|v| v.as_object()) else {
        return Err(bad_params(&req.id, "overrides must be an object of id -> score"));
    };
    Ok(obj
        .iter()
        .map(|(id, score)| (id.clone(), lenient_number(score)))
        .collect())
}

fn handle_what_if(state: &mut AppState, req: &Request) -> serde_json::Value {
    let assignments: Vec<Assignment> = match required_array(req, "assignments") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match groups_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cutoffs = match cutoffs_param(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let overrides = match parse_overrides(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let res = calc::what_if(&assignments, &groups, &cutoffs, &overrides, &state.config);
    ok(&req.id, json!(res))
}

fn handle_required_score(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let assignments: Vec<Assignment> = match required_array(req, "assignments") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match groups_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match req.params.get("assignmentId") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return bad_params(&req.id, "missing assignmentId"),
    };
    let Some(target) = req.params.get("targetPercentage").and_then(lenient_number) else {
        return bad_params(&req.id, "targetPercentage must be a number");
    };

    let outcome = calc::required_score(&assignments, &groups, &assignment_id, target);
    ok(&req.id, json!(outcome))
}

fn handle_cutoffs_validate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let cutoffs: Vec<GradeCutoff> = match required_array(req, "cutoffs") {
        Ok(v) => v,
        Err(e) => return e,
    };

    ok(
        &req.id,
        json!({
            "issues": letters::validate_cutoffs(&cutoffs),
            "sorted": letters::sorted_cutoffs(&cutoffs),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grade.effectiveWeight" => Some(handle_effective_weight(state, req)),
        "grade.overallPercentage" => Some(handle_overall_percentage(state, req)),
        "grade.letter" => Some(handle_letter(state, req)),
        "course.summary" => Some(handle_course_summary(state, req)),
        "course.whatIf" => Some(handle_what_if(state, req)),
        "course.requiredScore" => Some(handle_required_score(state, req)),
        "cutoffs.validate" => Some(handle_cutoffs_validate(state, req)),
        _ => None,
    }
}
