use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single piece of graded work as supplied by the caller.
///
/// Every numeric field is optional: strings, booleans and other junk read as
/// absent instead of failing the whole request. Effective weights are never
/// stored here; see `calc::effective_weight`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_dropped: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_extra_credit: bool,
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub relative_weight_in_group: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentGroup {
    #[serde(default, deserialize_with = "lenient_group_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub weight: Option<f64>,
}

/// Letter label with an inclusive lower bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCutoff {
    #[serde(default, deserialize_with = "lenient_string")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_percentage: Option<f64>,
}

impl GradeCutoff {
    pub fn new(grade: &str, min_percentage: f64) -> Self {
        Self {
            grade: Some(grade.to_string()),
            min_percentage: Some(min_percentage),
        }
    }
}

/// Drops NaN and infinities so callers building the model in Rust get the
/// same treatment as JSON input.
pub fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

pub fn lenient_number(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}

fn lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(lenient_number(&v))
}

fn lenient_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(v.as_bool().unwrap_or(false))
}

fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(v.as_str().map(|s| s.to_string()))
}

// Empty ids mean "no group", same as absent.
fn lenient_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    let id = match v {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return Ok(None),
    };
    if id.is_empty() {
        Ok(None)
    } else {
        Ok(Some(id))
    }
}

fn lenient_group_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_id(d)?.unwrap_or_default())
}
