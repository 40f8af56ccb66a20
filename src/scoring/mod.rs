//! Instantaneous engagement scoring.
//!
//! Pure functions from one detector outcome to one [`EngagementSample`]. The
//! timestamp is passed in so the same inputs always give the same sample.

use crate::detector::{Detection, Expressions};
use crate::state::{EngagementLevel, EngagementSample, FocusMetrics};
use std::time::SystemTime;

pub mod gaze;

/// Points for simply being present in frame.
pub const BASE_PRESENCE: f64 = 40.0;
pub const ENGAGEMENT_BONUS_WEIGHT: f64 = 40.0;
pub const PEAK_EXPRESSION_WEIGHT: f64 = 30.0;
pub const PRESENCE_BONUS: f64 = 10.0;
pub const NEUTRAL_EXPRESSION_FACTOR: f64 = 0.7;
pub const COMPREHENSION_NEUTRAL_WEIGHT: f64 = 60.0;
pub const COMPREHENSION_POSITIVE_WEIGHT: f64 = 40.0;
pub const COMPREHENSION_BASE: f64 = 20.0;
/// Participation lost per tick without a face.
pub const PARTICIPATION_DECAY: u8 = 5;

/// Intermediate scores for one detection, before rounding into a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub expression: f64,
    pub attention_term: f64,
    pub participation: f64,
    pub comprehension: f64,
    pub gaze: f64,
}

impl ScoreBreakdown {
    pub fn overall(&self) -> f64 {
        0.25 * self.expression
            + 0.25 * self.attention_term
            + 0.25 * self.participation
            + 0.25 * self.comprehension
    }
}

pub fn breakdown(detection: &Detection) -> ScoreBreakdown {
    let expressions = &detection.expressions;
    ScoreBreakdown {
        expression: expression_score(expressions),
        attention_term: attention_term(expressions),
        participation: participation_score(expressions),
        comprehension: comprehension_score(expressions),
        gaze: gaze::gaze_score(detection.landmarks.as_ref()),
    }
}

/// Score a tick. `previous_participation` is only read when no face was found.
pub fn score_outcome(
    outcome: Option<&Detection>,
    previous_participation: u8,
    timestamp: SystemTime,
) -> EngagementSample {
    match outcome {
        Some(detection) => score_detection(detection, timestamp),
        None => score_absence(previous_participation, timestamp),
    }
}

pub fn score_detection(detection: &Detection, timestamp: SystemTime) -> EngagementSample {
    let parts = breakdown(detection);
    let score = to_percent(parts.overall());

    EngagementSample {
        score,
        level: EngagementLevel::from_score(score),
        focus_metrics: FocusMetrics {
            attention: to_percent(parts.gaze),
            participation: to_percent(parts.participation),
            comprehension: to_percent(parts.comprehension),
        },
        timestamp,
    }
}

/// No face this tick: everything drops to zero except participation, which
/// decays gradually so a missed detection does not read as a walk-out.
pub fn score_absence(previous_participation: u8, timestamp: SystemTime) -> EngagementSample {
    EngagementSample {
        score: 0,
        level: EngagementLevel::Low,
        focus_metrics: FocusMetrics {
            attention: 0,
            participation: previous_participation
                .min(100)
                .saturating_sub(PARTICIPATION_DECAY),
            comprehension: 0,
        },
        timestamp,
    }
}

pub fn participation_score(expressions: &Expressions) -> f64 {
    let active = expressions.happy + expressions.surprised + expressions.neutral;
    let peak = expressions
        .happy
        .max(expressions.surprised)
        .max(expressions.neutral);
    let raw = BASE_PRESENCE
        + active * ENGAGEMENT_BONUS_WEIGHT
        + peak * PEAK_EXPRESSION_WEIGHT
        + PRESENCE_BONUS;
    raw.round().clamp(0.0, 100.0)
}

pub fn expression_score(expressions: &Expressions) -> f64 {
    (expressions.happy + expressions.surprised + expressions.neutral * NEUTRAL_EXPRESSION_FACTOR)
        * 100.0
}

pub fn attention_term(expressions: &Expressions) -> f64 {
    let negative =
        expressions.sad + expressions.angry + expressions.fearful + expressions.disgusted;
    ((1.0 - negative) * 100.0).max(0.0)
}

pub fn comprehension_score(expressions: &Expressions) -> f64 {
    let raw = expressions.neutral * COMPREHENSION_NEUTRAL_WEIGHT
        + (expressions.happy + expressions.surprised) * COMPREHENSION_POSITIVE_WEIGHT
        + COMPREHENSION_BASE;
    raw.round().clamp(0.0, 100.0)
}

fn to_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Landmarks, Point};
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn happy_face_scores_high() {
        let detection = Detection::new(Expressions {
            happy: 0.9,
            neutral: 0.05,
            ..Expressions::default()
        });

        let parts = breakdown(&detection);
        let sample = score_detection(&detection, at(1));

        assert!((parts.expression - 93.5).abs() < 1e-9);
        assert_eq!(parts.attention_term, 100.0);
        assert_eq!(parts.participation, 100.0);
        assert_eq!(parts.comprehension, 59.0);
        assert_eq!(sample.score, 88);
        assert_eq!(sample.level, EngagementLevel::High);
        assert_eq!(sample.focus_metrics.attention, 50);
        assert_eq!(sample.focus_metrics.participation, 100);
        assert_eq!(sample.focus_metrics.comprehension, 59);
        assert_eq!(sample.timestamp, at(1));
    }

    #[test]
    fn negative_expressions_pull_score_down() {
        let detection = Detection::new(Expressions {
            sad: 0.6,
            angry: 0.3,
            neutral: 0.1,
            ..Expressions::default()
        });

        let parts = breakdown(&detection);
        let sample = score_detection(&detection, at(2));

        // participation 40 + 4 + 3 + 10, comprehension 6 + 20
        assert_eq!(parts.participation, 57.0);
        assert_eq!(parts.comprehension, 26.0);
        assert!((parts.attention_term - 10.0).abs() < 1e-9);
        assert_eq!(sample.score, 25);
        assert_eq!(sample.level, EngagementLevel::Low);
    }

    #[test]
    fn attention_comes_from_gaze() {
        let detection = Detection::new(Expressions {
            neutral: 1.0,
            ..Expressions::default()
        })
        .with_landmarks(Landmarks {
            left_eye: vec![Point::new(10.0, 0.0)],
            right_eye: vec![Point::new(30.0, 0.0)],
            nose: vec![Point::new(25.0, 5.0)],
        });

        let sample = score_detection(&detection, at(3));

        assert_eq!(sample.focus_metrics.attention, 90);
    }

    #[test]
    fn absence_zeroes_metrics_and_decays_participation() {
        let sample = score_outcome(None, 62, at(4));

        assert_eq!(sample.score, 0);
        assert_eq!(sample.level, EngagementLevel::Low);
        assert_eq!(sample.focus_metrics.attention, 0);
        assert_eq!(sample.focus_metrics.comprehension, 0);
        assert_eq!(sample.focus_metrics.participation, 57);
    }

    #[test]
    fn participation_decay_stops_at_zero() {
        assert_eq!(score_absence(3, at(5)).focus_metrics.participation, 0);
        assert_eq!(score_absence(0, at(5)).focus_metrics.participation, 0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let detection = Detection::new(Expressions {
            happy: 0.3,
            surprised: 0.2,
            neutral: 0.4,
            fearful: 0.1,
            ..Expressions::default()
        });

        assert_eq!(
            score_detection(&detection, at(6)),
            score_detection(&detection, at(6))
        );
    }

    #[test]
    fn all_distributions_stay_in_range() {
        let steps: Vec<f64> = (0..=10).map(|step| step as f64 / 10.0).collect();
        for &happy in &steps {
            for &neutral in &steps {
                for &surprised in &steps {
                    let remaining = 1.0 - happy - neutral - surprised;
                    if remaining < -1e-9 {
                        continue;
                    }
                    let negative = remaining.max(0.0) / 4.0;
                    let detection = Detection::new(Expressions {
                        happy,
                        neutral,
                        surprised,
                        sad: negative,
                        angry: negative,
                        fearful: negative,
                        disgusted: negative,
                    });

                    let sample = score_detection(&detection, at(7));

                    assert!(sample.score <= 100);
                    assert!(sample.focus_metrics.attention <= 100);
                    assert!(sample.focus_metrics.participation <= 100);
                    assert!(sample.focus_metrics.comprehension <= 100);
                    assert_eq!(sample.level, EngagementLevel::from_score(sample.score));
                }
            }
        }
    }
}
