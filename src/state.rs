use crate::error::{CameraError, DetectorError, SamplerError};
use crate::session::{AggregatorConfig, SessionAggregator, SessionMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub const HIGH_ABOVE: u8 = 70;
    pub const MEDIUM_ABOVE: u8 = 40;

    pub fn from_score(score: u8) -> Self {
        if score > Self::HIGH_ABOVE {
            Self::High
        } else if score > Self::MEDIUM_ABOVE {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Teaching suggestions shown next to the level.
    pub fn suggestions(self) -> [&'static str; 2] {
        match self {
            Self::Low => [
                "Consider switching to visual aids or interactive content",
                "Try asking direct questions to re-engage students",
            ],
            Self::Medium => [
                "Good progress! Consider adding group activities",
                "Use AI assistant to provide varied explanations",
            ],
            Self::High => [
                "Excellent engagement! Students are actively learning",
                "Continue with current teaching approach",
            ],
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display band of a single 0-100 metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricBand {
    Low,
    Medium,
    High,
}

impl MetricBand {
    pub fn from_value(value: u8) -> Self {
        if value >= 80 {
            Self::High
        } else if value >= 60 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusMetrics {
    pub attention: u8,
    pub participation: u8,
    pub comprehension: u8,
}

/// One tick's engagement reading. Every numeric field is within 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementSample {
    pub score: u8,
    pub level: EngagementLevel,
    pub focus_metrics: FocusMetrics,
    pub timestamp: SystemTime,
}

impl EngagementSample {
    pub const NEUTRAL_VALUE: u8 = 50;

    /// The reading assumed before any frame has been scored.
    pub fn neutral(timestamp: SystemTime) -> Self {
        Self {
            score: Self::NEUTRAL_VALUE,
            level: EngagementLevel::from_score(Self::NEUTRAL_VALUE),
            focus_metrics: FocusMetrics {
                attention: Self::NEUTRAL_VALUE,
                participation: Self::NEUTRAL_VALUE,
                comprehension: Self::NEUTRAL_VALUE,
            },
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    CameraPermissionDenied,
    CameraUnavailable,
    DetectorUnavailable,
}

impl FailureReason {
    pub fn from_sampler_error(err: &SamplerError) -> Option<Self> {
        match err {
            SamplerError::Camera(CameraError::PermissionDenied(_)) => {
                Some(Self::CameraPermissionDenied)
            }
            SamplerError::Camera(CameraError::DeviceUnavailable(_)) => {
                Some(Self::CameraUnavailable)
            }
            SamplerError::Detector(DetectorError::Unavailable(_)) => {
                Some(Self::DetectorUnavailable)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerStatus {
    Idle,
    Starting,
    Active,
    /// Terminal for the session; no automatic retry.
    Failed {
        reason: FailureReason,
        message: String,
    },
    Stopped,
}

pub type LevelListener = Arc<dyn Fn(EngagementLevel) + Send + Sync>;

/// A level transition whose listeners have not run yet.
///
/// Returned by [`EngagementStore::publish`] so callers can release the store
/// lock before calling [`LevelChange::notify`]; listeners may read the store.
#[must_use = "level listeners only run when the change is notified"]
pub struct LevelChange {
    level: EngagementLevel,
    listeners: Vec<LevelListener>,
}

impl LevelChange {
    pub fn level(&self) -> EngagementLevel {
        self.level
    }

    pub fn notify(self) {
        for listener in &self.listeners {
            listener(self.level);
        }
    }
}

impl fmt::Debug for LevelChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelChange")
            .field("level", &self.level)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Process-wide engagement state.
///
/// `publish` is the only way to change the latest sample or the session
/// metrics, and it always goes through the aggregator. Consumers get an
/// [`EngagementReader`] and never write.
pub struct EngagementStore {
    aggregator: SessionAggregator,
    latest: EngagementSample,
    latest_tx: watch::Sender<EngagementSample>,
    session_tx: watch::Sender<SessionMetrics>,
    level_tx: watch::Sender<EngagementLevel>,
    status: SamplerStatus,
    status_tx: watch::Sender<SamplerStatus>,
    level_listeners: Vec<LevelListener>,
}

impl EngagementStore {
    pub fn new() -> Self {
        Self::with_config(AggregatorConfig::default())
    }

    pub fn with_config(config: AggregatorConfig) -> Self {
        let aggregator = SessionAggregator::new(config);
        let latest = EngagementSample::neutral(SystemTime::now());
        let (latest_tx, _latest_rx) = watch::channel(latest);
        let (session_tx, _session_rx) = watch::channel(aggregator.metrics().clone());
        let (level_tx, _level_rx) = watch::channel(latest.level);
        let (status_tx, _status_rx) = watch::channel(SamplerStatus::Idle);
        Self {
            aggregator,
            latest,
            latest_tx,
            session_tx,
            level_tx,
            status: SamplerStatus::Idle,
            status_tx,
            level_listeners: Vec::new(),
        }
    }

    pub fn latest(&self) -> &EngagementSample {
        &self.latest
    }

    pub fn session(&self) -> &SessionMetrics {
        self.aggregator.metrics()
    }

    pub fn sampler_status(&self) -> &SamplerStatus {
        &self.status
    }

    /// Record a new sample. Returns the pending notification when the level
    /// changed.
    pub fn publish(&mut self, sample: EngagementSample) -> Option<LevelChange> {
        let previous_level = self.latest.level;
        self.latest = sample;
        let session = self.aggregator.record(&sample).clone();

        self.latest_tx.send_replace(sample);
        self.session_tx.send_replace(session);

        if sample.level == previous_level {
            return None;
        }
        self.level_tx.send_replace(sample.level);
        Some(LevelChange {
            level: sample.level,
            listeners: self.level_listeners.clone(),
        })
    }

    /// Register a callback fired each time the published level changes.
    pub fn on_level_change<F>(&mut self, listener: F)
    where
        F: Fn(EngagementLevel) + Send + Sync + 'static,
    {
        self.level_listeners.push(Arc::new(listener));
    }

    pub(crate) fn set_sampler_status(&mut self, status: SamplerStatus) {
        self.status = status.clone();
        self.status_tx.send_replace(status);
    }

    pub fn reader(&self) -> EngagementReader {
        EngagementReader {
            latest: self.latest_tx.subscribe(),
            session: self.session_tx.subscribe(),
            level: self.level_tx.subscribe(),
            status: self.status_tx.subscribe(),
        }
    }
}

impl Default for EngagementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngagementStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngagementStore")
            .field("latest", &self.latest)
            .field("overall", &self.aggregator.metrics().overall)
            .field("status", &self.status)
            .field("level_listeners", &self.level_listeners.len())
            .finish()
    }
}

/// Read-only view of the store, cheap to clone and hand to consumers.
#[derive(Debug, Clone)]
pub struct EngagementReader {
    latest: watch::Receiver<EngagementSample>,
    session: watch::Receiver<SessionMetrics>,
    level: watch::Receiver<EngagementLevel>,
    status: watch::Receiver<SamplerStatus>,
}

impl EngagementReader {
    pub fn latest(&self) -> EngagementSample {
        *self.latest.borrow()
    }

    pub fn session(&self) -> SessionMetrics {
        self.session.borrow().clone()
    }

    pub fn level(&self) -> EngagementLevel {
        *self.level.borrow()
    }

    pub fn sampler_status(&self) -> SamplerStatus {
        self.status.borrow().clone()
    }

    /// A receiver that wakes on every level change.
    pub fn level_changes(&self) -> watch::Receiver<EngagementLevel> {
        self.level.clone()
    }
}
