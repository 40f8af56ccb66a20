use crate::sampler::SamplerSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_STABILIZATION_MS: u64 = 1000;
pub const DEFAULT_NO_FACE_GRACE_MS: u64 = 5000;
pub const DEFAULT_DETECTOR_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SNAPSHOT_PATH: &str = "/tmp/classroom-camera.jpg";
pub const DEFAULT_DETECTOR_ENDPOINT: &str = "http://127.0.0.1:5005/detect";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub sampler: Option<SamplerSection>,
    #[serde(default)]
    pub camera: Option<CameraSection>,
    #[serde(default)]
    pub detector: Option<DetectorSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplerSection {
    /// Detection period in milliseconds (default: 2000)
    pub interval_ms: Option<u64>,
    /// Delay between camera access and the first tick (default: 1000)
    pub stabilization_ms: Option<u64>,
    /// Absence tolerated before it is logged (default: 5000)
    pub no_face_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraSection {
    /// Image file refreshed by the capture process
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorSection {
    /// Candidate detector URLs, tried in order
    #[serde(default)]
    pub endpoints: Vec<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("sampler.interval_ms", self.sampler_value(|s| s.interval_ms)),
            (
                "sampler.no_face_grace_ms",
                self.sampler_value(|s| s.no_face_grace_ms),
            ),
            (
                "detector.timeout_ms",
                self.detector.as_ref().and_then(|d| d.timeout_ms),
            ),
        ];
        for (key, value) in durations {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{key} must be greater than 0")));
            }
        }
        Ok(())
    }

    fn sampler_value(&self, field: impl Fn(&SamplerSection) -> Option<u64>) -> Option<u64> {
        self.sampler.as_ref().and_then(field)
    }

    /// Returns the sampler timing, falling back to the defaults per field.
    pub fn sampler_settings(&self) -> SamplerSettings {
        let millis = |value: Option<u64>, default: u64| Duration::from_millis(value.unwrap_or(default));
        SamplerSettings {
            interval: millis(
                self.sampler_value(|s| s.interval_ms),
                DEFAULT_SAMPLE_INTERVAL_MS,
            ),
            stabilization_delay: millis(
                self.sampler_value(|s| s.stabilization_ms),
                DEFAULT_STABILIZATION_MS,
            ),
            no_face_grace: millis(
                self.sampler_value(|s| s.no_face_grace_ms),
                DEFAULT_NO_FACE_GRACE_MS,
            ),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        self.camera
            .as_ref()
            .and_then(|c| c.snapshot_path.as_deref())
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or(Path::new(DEFAULT_SNAPSHOT_PATH))
    }

    /// Returns the configured detector endpoints, or the local default.
    pub fn detector_endpoints(&self) -> Vec<String> {
        match &self.detector {
            Some(section) if !section.endpoints.is_empty() => section.endpoints.clone(),
            _ => vec![DEFAULT_DETECTOR_ENDPOINT.to_string()],
        }
    }

    pub fn detector_timeout(&self) -> Duration {
        let millis = self
            .detector
            .as_ref()
            .and_then(|d| d.timeout_ms)
            .unwrap_or(DEFAULT_DETECTOR_TIMEOUT_MS);
        Duration::from_millis(millis)
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }
}
