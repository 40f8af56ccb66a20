use crate::session::PerMetric;
use crate::state::{EngagementLevel, FailureReason, MetricBand};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FocusMetricsResponse {
    pub attention: u8,
    pub participation: u8,
    pub comprehension: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricBandsResponse {
    pub attention: MetricBand,
    pub participation: MetricBand,
    pub comprehension: MetricBand,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EngagementSuccessResponse {
    pub score: u8,
    pub level: EngagementLevel,
    pub focus_metrics: FocusMetricsResponse,
    pub bands: MetricBandsResponse,
    pub suggestions: Vec<String>,
    /// Samples aggregated so far; 0 means the values are the neutral defaults.
    pub samples: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionSuccessResponse {
    pub overall: PerMetric<u8>,
    pub history_lengths: PerMetric<usize>,
    pub samples: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SamplerState {
    Idle,
    Starting,
    Active,
    Failed,
    Stopped,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub sampler: SamplerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiErrorResponse {
    pub error_code: ApiErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InternalError,
}
