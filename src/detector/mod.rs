//! Face/expression/landmark detection capability.
//!
//! The detector itself is an external backend. This module fixes the shape of
//! what it returns and validates payloads before they reach the scorer.

use crate::camera::Frame;
use crate::error::DetectorError;
use async_trait::async_trait;
use serde::Deserialize;

pub mod mock;
pub mod remote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expression {
    Happy,
    Neutral,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Expression::Happy,
        Expression::Neutral,
        Expression::Sad,
        Expression::Angry,
        Expression::Surprised,
        Expression::Fearful,
        Expression::Disgusted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Surprised => "surprised",
            Self::Fearful => "fearful",
            Self::Disgusted => "disgusted",
        }
    }
}

/// Per-expression probabilities. Keys outside the closed set are rejected;
/// missing keys read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expressions {
    #[serde(default)]
    pub happy: f64,
    #[serde(default)]
    pub neutral: f64,
    #[serde(default)]
    pub sad: f64,
    #[serde(default)]
    pub angry: f64,
    #[serde(default)]
    pub surprised: f64,
    #[serde(default)]
    pub fearful: f64,
    #[serde(default)]
    pub disgusted: f64,
}

impl Expressions {
    pub fn get(&self, expression: Expression) -> f64 {
        match expression {
            Expression::Happy => self.happy,
            Expression::Neutral => self.neutral,
            Expression::Sad => self.sad,
            Expression::Angry => self.angry,
            Expression::Surprised => self.surprised,
            Expression::Fearful => self.fearful,
            Expression::Disgusted => self.disgusted,
        }
    }

    /// The expression with the highest probability.
    pub fn dominant(&self) -> Expression {
        Expression::ALL
            .into_iter()
            .fold(Expression::Neutral, |best, candidate| {
                if self.get(candidate) > self.get(best) {
                    candidate
                } else {
                    best
                }
            })
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        for expression in Expression::ALL {
            let probability = self.get(expression);
            if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
                return Err(DetectorError::InvalidPayload(format!(
                    "{} probability out of range: {probability}",
                    expression.as_str()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Facial landmark point sets, each ordered as the detector emits them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Landmarks {
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
    pub nose: Vec<Point>,
}

impl Landmarks {
    pub fn validate(&self) -> Result<(), DetectorError> {
        let sets = [
            ("left_eye", &self.left_eye),
            ("right_eye", &self.right_eye),
            ("nose", &self.nose),
        ];
        for (name, points) in sets {
            if let Some(point) = points.iter().find(|point| !point.is_finite()) {
                return Err(DetectorError::InvalidPayload(format!(
                    "{name} landmark is not finite: ({}, {})",
                    point.x, point.y
                )));
            }
        }
        Ok(())
    }
}

/// One detected face.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Detection {
    pub expressions: Expressions,
    #[serde(default)]
    pub landmarks: Option<Landmarks>,
}

impl Detection {
    pub fn new(expressions: Expressions) -> Self {
        Self {
            expressions,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Landmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        self.expressions.validate()?;
        if let Some(landmarks) = &self.landmarks {
            landmarks.validate()?;
        }
        Ok(())
    }
}

/// Detection backend. `Ok(None)` means no face in the frame, which is a
/// normal outcome.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Locate or load the backend before the first frame is submitted.
    async fn prepare(&self) -> Result<(), DetectorError> {
        Ok(())
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<Detection>, DetectorError>;
}
