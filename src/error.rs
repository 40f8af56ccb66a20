use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
}

/// Camera acquisition failures. Both are terminal for the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// No detector backend could be reached or loaded.
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    /// A single detection call failed; the next tick retries.
    #[error("detection failed: {0}")]
    Transient(String),
    #[error("invalid detector payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("sampler already started")]
    AlreadyStarted,
}
