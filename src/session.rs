//! Session-level smoothing of per-tick samples.
//!
//! Each metric keeps a bounded history; its overall value is a recency- and
//! frequency-weighted average blended with the previous overall, so one
//! missed detection does not drag the session view to zero.

use crate::state::EngagementSample;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

pub const NEUTRAL_OVERALL: u8 = 50;
pub const DEFAULT_HISTORY_CAP: usize = 100;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    /// Entries kept per metric; the oldest are evicted first.
    pub history_cap: usize,
    /// Entries at least this old are ignored when averaging.
    pub max_age: Duration,
    /// Time constant of the exponential recency decay.
    pub recency_decay: Duration,
    /// Window in which high readings get the recent-engagement boost.
    pub recent_window: Duration,
    pub bucket_width: u8,
    pub max_frequency_weight: f64,
    pub recent_high_threshold: u8,
    pub recent_high_boost: f64,
    pub low_outlier_threshold: u8,
    pub low_outlier_factor: f64,
    pub stable_band: (u8, u8),
    pub stable_band_boost: f64,
    /// Share of the new weighted average in the blended overall.
    pub smoothing: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            max_age: DEFAULT_MAX_AGE,
            recency_decay: Duration::from_secs(120),
            recent_window: Duration::from_secs(30),
            bucket_width: 10,
            max_frequency_weight: 2.0,
            recent_high_threshold: 60,
            recent_high_boost: 1.5,
            low_outlier_threshold: 20,
            low_outlier_factor: 0.3,
            stable_band: (40, 80),
            stable_band_boost: 1.2,
            smoothing: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Attention,
    Participation,
    Comprehension,
    Score,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Attention,
        Metric::Participation,
        Metric::Comprehension,
        Metric::Score,
    ];

    pub fn value_of(self, sample: &EngagementSample) -> u8 {
        match self {
            Metric::Attention => sample.focus_metrics.attention,
            Metric::Participation => sample.focus_metrics.participation,
            Metric::Comprehension => sample.focus_metrics.comprehension,
            Metric::Score => sample.score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricHistoryEntry {
    pub value: u8,
    pub timestamp: SystemTime,
}

/// One value per metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerMetric<T> {
    pub attention: T,
    pub participation: T,
    pub comprehension: T,
    pub score: T,
}

impl<T> PerMetric<T> {
    pub fn splat(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            attention: value.clone(),
            participation: value.clone(),
            comprehension: value.clone(),
            score: value,
        }
    }

    pub fn get(&self, metric: Metric) -> &T {
        match metric {
            Metric::Attention => &self.attention,
            Metric::Participation => &self.participation,
            Metric::Comprehension => &self.comprehension,
            Metric::Score => &self.score,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut T {
        match metric {
            Metric::Attention => &mut self.attention,
            Metric::Participation => &mut self.participation,
            Metric::Comprehension => &mut self.comprehension,
            Metric::Score => &mut self.score,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerMetric<U> {
        PerMetric {
            attention: f(&self.attention),
            participation: f(&self.participation),
            comprehension: f(&self.comprehension),
            score: f(&self.score),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetrics {
    pub history: PerMetric<VecDeque<MetricHistoryEntry>>,
    pub overall: PerMetric<u8>,
    /// Samples aggregated since the session started.
    pub samples: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            history: PerMetric::default(),
            overall: PerMetric::splat(NEUTRAL_OVERALL),
            samples: 0,
        }
    }

    pub fn history_lengths(&self) -> PerMetric<usize> {
        self.history.map(VecDeque::len)
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Sole owner and mutator of [`SessionMetrics`].
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    config: AggregatorConfig,
    metrics: SessionMetrics,
}

impl SessionAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            metrics: SessionMetrics::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AggregatorConfig::default())
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Fold one sample into every metric, using its timestamp as "now".
    pub fn record(&mut self, sample: &EngagementSample) -> &SessionMetrics {
        for metric in Metric::ALL {
            self.record_value(metric, metric.value_of(sample), sample.timestamp);
        }
        self.metrics.samples += 1;
        &self.metrics
    }

    fn record_value(&mut self, metric: Metric, value: u8, timestamp: SystemTime) {
        let history = self.metrics.history.get_mut(metric);
        history.push_back(MetricHistoryEntry { value, timestamp });
        while history.len() > self.config.history_cap {
            history.pop_front();
        }

        let previous = *self.metrics.overall.get(metric);
        let overall = smoothed_overall(history, previous, timestamp, &self.config);
        *self.metrics.overall.get_mut(metric) = overall;
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Weighted, smoothed overall for one metric's history as of `now`.
pub fn smoothed_overall(
    history: &VecDeque<MetricHistoryEntry>,
    previous: u8,
    now: SystemTime,
    config: &AggregatorConfig,
) -> u8 {
    let retained: Vec<(u8, Duration)> = history
        .iter()
        .filter_map(|entry| {
            // Entries stamped after `now` count as brand new.
            let age = now.duration_since(entry.timestamp).unwrap_or(Duration::ZERO);
            (age < config.max_age).then_some((entry.value, age))
        })
        .collect();
    if retained.is_empty() {
        return NEUTRAL_OVERALL;
    }

    let bucket_width = config.bucket_width.max(1);
    let mut bucket_counts: HashMap<u8, usize> = HashMap::new();
    for (value, _) in &retained {
        *bucket_counts.entry(value / bucket_width).or_default() += 1;
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (value, age) in &retained {
        let bucket_count = bucket_counts.get(&(value / bucket_width)).copied().unwrap_or(1);
        let weight = entry_weight(*value, *age, bucket_count, config);
        weighted_sum += f64::from(*value) * weight;
        total_weight += weight;
    }
    if total_weight <= 0.0 {
        return NEUTRAL_OVERALL;
    }

    let weighted_average = weighted_sum / total_weight;
    let smoothed =
        config.smoothing * weighted_average + (1.0 - config.smoothing) * f64::from(previous);
    smoothed.clamp(0.0, 100.0).round() as u8
}

fn entry_weight(value: u8, age: Duration, bucket_count: usize, config: &AggregatorConfig) -> f64 {
    let decay_ms = config.recency_decay.as_secs_f64() * 1000.0;
    let age_ms = age.as_secs_f64() * 1000.0;
    let recency = if decay_ms > 0.0 {
        (-age_ms / decay_ms).exp()
    } else {
        1.0
    };
    let frequency = ((bucket_count as f64 + 1.0).ln() + 1.0).min(config.max_frequency_weight);

    let mut weight = recency * frequency;
    if age < config.recent_window && value > config.recent_high_threshold {
        weight *= config.recent_high_boost;
    }
    if value < config.low_outlier_threshold {
        weight *= config.low_outlier_factor;
    }
    let (band_low, band_high) = config.stable_band;
    if (band_low..=band_high).contains(&value) {
        weight *= config.stable_band_boost;
    }
    weight
}
