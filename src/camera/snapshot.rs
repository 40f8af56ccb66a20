//! File-backed camera.
//!
//! An external capture process (e.g. `fswebcam --loop`) keeps overwriting a
//! single still image; each tick reads whatever frame is there.

use crate::camera::{CameraDevice, Frame, MediaStream, ReadyState};
use crate::error::CameraError;
use async_trait::async_trait;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SnapshotCamera {
    path: PathBuf,
}

impl SnapshotCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CameraDevice for SnapshotCamera {
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, CameraError> {
        let metadata = std::fs::metadata(&self.path).map_err(|err| map_io_error(&self.path, err))?;
        if metadata.is_dir() {
            return Err(CameraError::DeviceUnavailable(format!(
                "{} is a directory",
                self.path.display()
            )));
        }
        File::open(&self.path).map_err(|err| map_io_error(&self.path, err))?;

        Ok(Box::new(SnapshotStream {
            path: self.path.clone(),
            live: true,
        }))
    }
}

fn map_io_error(path: &Path, err: std::io::Error) -> CameraError {
    match err.kind() {
        ErrorKind::PermissionDenied => {
            CameraError::PermissionDenied(format!("{}: {err}", path.display()))
        }
        _ => CameraError::DeviceUnavailable(format!("{}: {err}", path.display())),
    }
}

pub struct SnapshotStream {
    path: PathBuf,
    live: bool,
}

impl MediaStream for SnapshotStream {
    fn ready_state(&self) -> ReadyState {
        if !self.live {
            return ReadyState::HaveNothing;
        }
        match std::fs::metadata(&self.path) {
            Ok(metadata) if metadata.len() > 0 => ReadyState::HaveCurrentData,
            Ok(_) => ReadyState::HaveMetadata,
            Err(_) => ReadyState::HaveNothing,
        }
    }

    fn grab_frame(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }
        match std::fs::read(&self.path) {
            Ok(data) if !data.is_empty() => Some(Frame {
                data,
                captured_at: SystemTime::now(),
            }),
            Ok(_) => None,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "Snapshot frame not readable");
                None
            }
        }
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::UNIX_EPOCH;

    fn temp_path(label: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        Ok(std::env::temp_dir().join(format!("engagement-snapshot-{label}-{unique}.jpg")))
    }

    #[tokio::test]
    async fn missing_snapshot_is_device_unavailable() -> Result<(), Box<dyn std::error::Error>> {
        let camera = SnapshotCamera::new(temp_path("missing")?);

        let result = camera.acquire().await;

        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));
        Ok(())
    }

    #[tokio::test]
    async fn empty_snapshot_is_not_ready() -> Result<(), Box<dyn std::error::Error>> {
        let path = temp_path("empty")?;
        fs::write(&path, b"")?;
        let camera = SnapshotCamera::new(&path);

        let mut stream = camera.acquire().await?;
        let state = stream.ready_state();
        let frame = stream.grab_frame();
        let _ = fs::remove_file(&path);

        assert_eq!(state, ReadyState::HaveMetadata);
        assert!(frame.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_frame_carries_file_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let path = temp_path("frame")?;
        fs::write(&path, [1u8, 2, 3])?;
        let camera = SnapshotCamera::new(&path);

        let mut stream = camera.acquire().await?;
        let state = stream.ready_state();
        let frame = stream.grab_frame();
        stream.stop_tracks();
        let after_stop = stream.grab_frame();
        let _ = fs::remove_file(&path);

        assert_eq!(state, ReadyState::HaveCurrentData);
        assert_eq!(frame.map(|frame| frame.data), Some(vec![1, 2, 3]));
        assert!(after_stop.is_none());
        Ok(())
    }
}
