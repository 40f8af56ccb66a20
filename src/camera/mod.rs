use crate::error::CameraError;
use async_trait::async_trait;
use std::fmt;
use std::time::SystemTime;

pub mod mock;
pub mod snapshot;

/// One still image grabbed from a live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: SystemTime,
}

/// How far a stream is from yielding a decodable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
}

pub trait MediaStream: Send {
    fn ready_state(&self) -> ReadyState;
    fn grab_frame(&mut self) -> Option<Frame>;
    /// Stop every track of the stream. Must tolerate repeated calls.
    fn stop_tracks(&mut self);
    fn is_live(&self) -> bool;
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// Holds the stream frames are pulled from between attach and detach.
#[derive(Default)]
pub struct FrameSource {
    stream: Option<Box<dyn MediaStream>>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a stream, stopping whatever was attached before.
    pub fn attach(&mut self, stream: Box<dyn MediaStream>) {
        self.release();
        self.stream = Some(stream);
    }

    fn detach(&mut self) -> Option<Box<dyn MediaStream>> {
        self.stream.take()
    }

    /// Detach and stop the attached stream, if any.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.detach() {
            stream.stop_tracks();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.is_live() && stream.ready_state() >= ReadyState::HaveCurrentData)
    }

    pub fn current_frame(&mut self) -> Option<Frame> {
        if !self.is_ready() {
            return None;
        }
        self.stream.as_mut()?.grab_frame()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("attached", &self.is_attached())
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::mock::MockCamera;

    #[tokio::test]
    async fn frame_source_yields_frames_once_ready() -> Result<(), CameraError> {
        let camera = MockCamera::granted();
        let mut source = FrameSource::new();
        source.attach(camera.acquire().await?);

        assert!(source.is_ready());
        assert!(source.current_frame().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn frame_source_skips_stream_without_current_data() -> Result<(), CameraError> {
        let camera = MockCamera::not_ready();
        let mut source = FrameSource::new();
        source.attach(camera.acquire().await?);

        assert!(source.is_attached());
        assert!(!source.is_ready());
        assert!(source.current_frame().is_none());
        assert_eq!(camera.probe().frames_grabbed(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn attach_replaces_and_stops_previous_stream() -> Result<(), CameraError> {
        let camera = MockCamera::granted();
        let probe = camera.probe();
        let mut source = FrameSource::new();
        source.attach(camera.acquire().await?);
        source.attach(camera.acquire().await?);

        assert_eq!(probe.acquired(), 2);
        assert_eq!(probe.stopped(), 1);

        source.release();
        source.release();

        assert_eq!(probe.stopped(), 2);
        assert!(!source.is_attached());
        Ok(())
    }

    #[tokio::test]
    async fn dropping_frame_source_stops_stream() -> Result<(), CameraError> {
        let camera = MockCamera::granted();
        let probe = camera.probe();
        {
            let mut source = FrameSource::new();
            source.attach(camera.acquire().await?);
        }

        assert_eq!(probe.stopped(), 1);
        Ok(())
    }
}
