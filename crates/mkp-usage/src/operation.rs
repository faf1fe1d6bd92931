use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const OPERATION_NAME: &str = "Codelab Usage Report";

/// `2024-01-01T00:00:00Z`: seconds precision, UTC, `Z` suffix.
pub fn report_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// `<service>/<plan with '-' replaced by '_'>_requests`
pub fn metric_name(service_name: &str, plan_id: &str) -> String {
    format!("{}/{}_requests", service_name, plan_id.replace('-', "_"))
}

/// Service-control operation, camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOperation {
    pub operation_id: String,
    pub operation_name: String,
    pub consumer_id: String,
    pub start_time: String,
    pub end_time: String,
    pub metric_value_sets: Vec<MetricValueSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValueSet {
    pub metric_name: String,
    pub metric_values: Vec<MetricValue>,
}

/// int64 values travel as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValue {
    #[serde(rename = "int64Value")]
    pub int64_value: String,
}

impl UsageOperation {
    pub fn new(
        consumer_id: &str,
        start_time: &str,
        end_time: &str,
        metric_name: String,
        value: i64,
    ) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            operation_name: OPERATION_NAME.to_string(),
            consumer_id: consumer_id.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            metric_value_sets: vec![MetricValueSet {
                metric_name,
                metric_values: vec![MetricValue {
                    int64_value: value.to_string(),
                }],
            }],
        }
    }
}

/// One entry of a check response's `checkErrors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
