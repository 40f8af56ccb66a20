use crate::api::responses::{
    ApiErrorCode, ApiErrorResponse, EngagementSuccessResponse, FocusMetricsResponse,
    HealthStatus, HealthSuccessResponse, MetricBandsResponse, SamplerState,
    SessionSuccessResponse,
};
use crate::state::{EngagementReader, MetricBand, SamplerStatus};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

#[derive(Debug)]
pub enum ApiResponse<T> {
    Success {
        status: StatusCode,
        body: T,
    },
    Error {
        status: StatusCode,
        body: ApiErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_engagement(State(reader): State<EngagementReader>) -> impl IntoResponse {
    build_engagement_response(&reader)
}

pub async fn get_session(State(reader): State<EngagementReader>) -> impl IntoResponse {
    build_session_response(&reader, SystemTime::now())
}

pub async fn get_health(State(reader): State<EngagementReader>) -> impl IntoResponse {
    build_health_response(&reader, SystemTime::now())
}

fn build_engagement_response(reader: &EngagementReader) -> ApiResponse<EngagementSuccessResponse> {
    let sample = reader.latest();
    let samples = reader.session().samples;

    let timestamp = match format_timestamp(sample.timestamp) {
        Ok(formatted) => formatted,
        Err(_err) => return internal_error("/api/engagement", "timestamp formatting failure"),
    };
    let metrics = sample.focus_metrics;

    ApiResponse::Success {
        status: StatusCode::OK,
        body: EngagementSuccessResponse {
            score: sample.score,
            level: sample.level,
            focus_metrics: FocusMetricsResponse {
                attention: metrics.attention,
                participation: metrics.participation,
                comprehension: metrics.comprehension,
            },
            bands: MetricBandsResponse {
                attention: MetricBand::from_value(metrics.attention),
                participation: MetricBand::from_value(metrics.participation),
                comprehension: MetricBand::from_value(metrics.comprehension),
            },
            suggestions: sample
                .level
                .suggestions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            samples,
            timestamp,
        },
    }
}

fn build_session_response(
    reader: &EngagementReader,
    now: SystemTime,
) -> ApiResponse<SessionSuccessResponse> {
    let session = reader.session();

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: SessionSuccessResponse {
                history_lengths: session.history_lengths(),
                overall: session.overall,
                samples: session.samples,
                timestamp,
            },
        },
        Err(_err) => internal_error("/api/session", "timestamp formatting failure"),
    }
}

fn build_health_response(
    reader: &EngagementReader,
    now: SystemTime,
) -> ApiResponse<HealthSuccessResponse> {
    let sampler_status = reader.sampler_status();

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => return internal_error("/api/health", "timestamp formatting failure"),
    };

    let (status, sampler, reason, message) = match sampler_status {
        SamplerStatus::Active => (HealthStatus::Ok, SamplerState::Active, None, None),
        SamplerStatus::Idle => (HealthStatus::Degraded, SamplerState::Idle, None, None),
        SamplerStatus::Starting => (HealthStatus::Degraded, SamplerState::Starting, None, None),
        SamplerStatus::Stopped => (HealthStatus::Ko, SamplerState::Stopped, None, None),
        SamplerStatus::Failed { reason, message } => (
            HealthStatus::Ko,
            SamplerState::Failed,
            Some(reason),
            Some(message),
        ),
    };
    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    ApiResponse::Success {
        status: status_code,
        body: HealthSuccessResponse {
            status,
            sampler,
            reason,
            message,
            timestamp,
        },
    }
}

fn internal_error<T>(endpoint: &str, message: &str) -> ApiResponse<T> {
    error!(
        endpoint = endpoint,
        message = message,
        "Internal error while handling request"
    );
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ApiErrorResponse {
            error_code: ApiErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CameraError, SamplerError};
    use crate::state::{
        EngagementLevel, EngagementSample, EngagementStore, FailureReason, FocusMetrics,
    };
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn uniform(value: u8, secs: u64) -> EngagementSample {
        EngagementSample {
            score: value,
            level: EngagementLevel::from_score(value),
            focus_metrics: FocusMetrics {
                attention: value,
                participation: value,
                comprehension: value,
            },
            timestamp: at(secs),
        }
    }

    #[test]
    fn engagement_returns_latest_sample_with_bands_and_suggestions() {
        let mut store = EngagementStore::new();
        let reader = store.reader();
        let _ = store.publish(EngagementSample {
            score: 88,
            level: EngagementLevel::High,
            focus_metrics: FocusMetrics {
                attention: 50,
                participation: 100,
                comprehension: 65,
            },
            timestamp: at(1),
        });

        let response = build_engagement_response(&reader);

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.score, 88);
                assert_eq!(body.level, EngagementLevel::High);
                assert_eq!(body.focus_metrics.participation, 100);
                assert_eq!(body.bands.attention, MetricBand::Low);
                assert_eq!(body.bands.participation, MetricBand::High);
                assert_eq!(body.bands.comprehension, MetricBand::Medium);
                assert_eq!(
                    body.suggestions,
                    vec![
                        "Excellent engagement! Students are actively learning",
                        "Continue with current teaching approach",
                    ]
                );
                assert_eq!(body.samples, 1);
                assert_eq!(body.timestamp, "1970-01-01T00:00:01Z");
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn engagement_before_first_sample_is_neutral() {
        let store = EngagementStore::new();

        let response = build_engagement_response(&store.reader());

        match response {
            ApiResponse::Success { body, .. } => {
                assert_eq!(body.score, 50);
                assert_eq!(body.level, EngagementLevel::Medium);
                assert_eq!(body.samples, 0);
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn reader_handed_to_router_follows_later_publishes() {
        let mut store = EngagementStore::new();
        let reader = store.reader();
        let _app = crate::api::router(reader.clone());

        let _ = store.publish(uniform(20, 1));
        let _ = store.publish(uniform(30, 2));

        match build_engagement_response(&reader) {
            ApiResponse::Success { body, .. } => {
                assert_eq!(body.score, 30);
                assert_eq!(body.level, EngagementLevel::Low);
                assert_eq!(body.samples, 2);
                assert_eq!(body.timestamp, "1970-01-01T00:00:02Z");
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn session_reports_overall_values_and_history_lengths() {
        let mut store = EngagementStore::new();
        let reader = store.reader();
        for secs in 1..=3 {
            let _ = store.publish(uniform(70, secs));
        }

        let response = build_session_response(&reader, at(10));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.samples, 3);
                assert_eq!(body.history_lengths.score, 3);
                assert_eq!(body.history_lengths.attention, 3);
                assert!(body.overall.score > 50);
                assert!(body.overall.score <= 70);
                assert_eq!(body.timestamp, "1970-01-01T00:00:10Z");
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_is_degraded_before_sampler_starts() {
        let store = EngagementStore::new();

        let response = build_health_response(&store.reader(), at(1));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.status, HealthStatus::Degraded);
                assert_eq!(body.sampler, SamplerState::Idle);
                assert!(body.reason.is_none());
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_is_ok_while_sampler_active() {
        let mut store = EngagementStore::new();
        let reader = store.reader();
        store.set_sampler_status(SamplerStatus::Active);

        let response = build_health_response(&reader, at(1));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.status, HealthStatus::Ok);
                assert_eq!(body.sampler, SamplerState::Active);
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_is_ko_with_reason_when_sampler_failed() {
        let err = SamplerError::Camera(CameraError::PermissionDenied("blocked".to_string()));
        let mut store = EngagementStore::new();
        let reader = store.reader();
        store.set_sampler_status(SamplerStatus::Failed {
            reason: FailureReason::CameraPermissionDenied,
            message: err.to_string(),
        });

        let response = build_health_response(&reader, at(1));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.status, HealthStatus::Ko);
                assert_eq!(body.sampler, SamplerState::Failed);
                assert_eq!(body.reason, Some(FailureReason::CameraPermissionDenied));
                assert_eq!(body.message, Some(err.to_string()));
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_is_ko_after_stop() {
        let mut store = EngagementStore::new();
        let reader = store.reader();
        store.set_sampler_status(SamplerStatus::Stopped);

        let response = build_health_response(&reader, at(1));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.sampler, SamplerState::Stopped);
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }
}
