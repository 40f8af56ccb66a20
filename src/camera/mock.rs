use crate::camera::{CameraDevice, Frame, MediaStream, ReadyState};
use crate::error::CameraError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAcquire {
    Granted,
    PermissionDenied,
    Unavailable,
}

/// Shared counters so tests can observe a camera after handing it off.
#[derive(Debug, Clone, Default)]
pub struct MockCameraProbe {
    acquired: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
    frames: Arc<AtomicUsize>,
}

impl MockCameraProbe {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Number of streams whose tracks were stopped.
    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn frames_grabbed(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct MockCamera {
    acquire: MockAcquire,
    ready: bool,
    probe: MockCameraProbe,
}

impl MockCamera {
    pub fn granted() -> Self {
        Self {
            acquire: MockAcquire::Granted,
            ready: true,
            probe: MockCameraProbe::default(),
        }
    }

    pub fn denied() -> Self {
        Self {
            acquire: MockAcquire::PermissionDenied,
            ..Self::granted()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            acquire: MockAcquire::Unavailable,
            ..Self::granted()
        }
    }

    /// Access is granted but the stream never reaches current data.
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::granted()
        }
    }

    pub fn probe(&self) -> MockCameraProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, CameraError> {
        match self.acquire {
            MockAcquire::Granted => {
                self.probe.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockStream {
                    ready: self.ready,
                    live: true,
                    probe: self.probe.clone(),
                }))
            }
            MockAcquire::PermissionDenied => Err(CameraError::PermissionDenied(
                "mock permission denied".to_string(),
            )),
            MockAcquire::Unavailable => Err(CameraError::DeviceUnavailable(
                "mock camera missing".to_string(),
            )),
        }
    }
}

pub struct MockStream {
    ready: bool,
    live: bool,
    probe: MockCameraProbe,
}

impl MediaStream for MockStream {
    fn ready_state(&self) -> ReadyState {
        if self.live && self.ready {
            ReadyState::HaveCurrentData
        } else {
            ReadyState::HaveMetadata
        }
    }

    fn grab_frame(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }
        self.probe.frames.fetch_add(1, Ordering::SeqCst);
        Some(Frame {
            data: vec![0xff, 0xd8, 0xff],
            captured_at: SystemTime::now(),
        })
    }

    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.probe.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
