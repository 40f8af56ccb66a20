use crate::camera::Frame;
use crate::detector::{Detection, FaceDetector};
use crate::error::DetectorError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Face(Detection),
    NoFace,
    Fail,
}

/// Replays scripted outcomes, then keeps returning the fallback.
#[derive(Debug, Clone)]
pub struct MockDetector {
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    fallback: MockOutcome,
    prepare_ok: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockDetector {
    pub fn new(script: Vec<MockOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback: MockOutcome::NoFace,
            prepare_ok: true,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always(outcome: MockOutcome) -> Self {
        Self::new(Vec::new()).with_fallback(outcome)
    }

    pub fn unavailable() -> Self {
        Self {
            prepare_ok: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_fallback(mut self, outcome: MockOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Make every detection call take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl FaceDetector for MockDetector {
    async fn prepare(&self) -> Result<(), DetectorError> {
        if self.prepare_ok {
            Ok(())
        } else {
            Err(DetectorError::Unavailable("mock models missing".to_string()))
        }
    }

    async fn detect(&self, _frame: &Frame) -> Result<Option<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_outcome() {
            MockOutcome::Face(detection) => Ok(Some(detection)),
            MockOutcome::NoFace => Ok(None),
            MockOutcome::Fail => Err(DetectorError::Transient("mock detection failed".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Expressions;
    use std::time::SystemTime;

    fn frame() -> Frame {
        Frame {
            data: vec![0],
            captured_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn script_runs_before_fallback() {
        let face = Detection::new(Expressions {
            happy: 1.0,
            ..Expressions::default()
        });
        let detector = MockDetector::new(vec![MockOutcome::Face(face.clone()), MockOutcome::Fail]);

        assert_eq!(detector.detect(&frame()).await, Ok(Some(face)));
        assert!(matches!(
            detector.detect(&frame()).await,
            Err(DetectorError::Transient(_))
        ));
        assert_eq!(detector.detect(&frame()).await, Ok(None));
        assert_eq!(detector.calls(), 3);
    }

    #[tokio::test]
    async fn unavailable_detector_fails_prepare() {
        let detector = MockDetector::unavailable();

        assert!(matches!(
            detector.prepare().await,
            Err(DetectorError::Unavailable(_))
        ));
    }
}
