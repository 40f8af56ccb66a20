use crate::camera::Frame;
use crate::detector::{Detection, FaceDetector};
use crate::error::DetectorError;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Face-analysis service reached over plain HTTP.
///
/// Frames are posted as raw bytes; the reply is a JSON object whose
/// `detection` field is either `null` or a [`Detection`].
pub struct RemoteDetector {
    endpoints: Vec<String>,
    timeout: Duration,
    active: OnceLock<String>,
}

impl RemoteDetector {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        Self {
            endpoints,
            timeout,
            active: OnceLock::new(),
        }
    }

    /// Endpoint chosen by `prepare`, or the first configured one before that.
    pub fn active_endpoint(&self) -> Option<&str> {
        self.active
            .get()
            .or_else(|| self.endpoints.first())
            .map(String::as_str)
    }
}

impl fmt::Debug for RemoteDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDetector")
            .field("endpoints", &self.endpoints)
            .field("timeout", &self.timeout)
            .field("active", &self.active.get())
            .finish()
    }
}

#[async_trait]
impl FaceDetector for RemoteDetector {
    async fn prepare(&self) -> Result<(), DetectorError> {
        let endpoints = self.endpoints.clone();
        let timeout = self.timeout;
        let reachable = tokio::task::spawn_blocking(move || first_reachable(&endpoints, timeout))
            .await
            .map_err(|err| DetectorError::Unavailable(format!("probe task failed: {err}")))?;

        match reachable {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "Detector endpoint selected");
                let _ = self.active.set(endpoint);
                Ok(())
            }
            None => Err(DetectorError::Unavailable(format!(
                "none of {} detector endpoints reachable",
                self.endpoints.len()
            ))),
        }
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<Detection>, DetectorError> {
        let endpoint = self
            .active_endpoint()
            .ok_or_else(|| DetectorError::Unavailable("no detector endpoints configured".to_string()))?
            .to_string();
        let payload = frame.data.clone();
        let timeout = self.timeout;

        let body = tokio::task::spawn_blocking(move || send_http_frame(&endpoint, &payload, timeout))
            .await
            .map_err(|err| DetectorError::Transient(format!("detector task failed: {err}")))??;

        parse_detect_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detection: Option<Detection>,
}

fn parse_detect_response(body: &str) -> Result<Option<Detection>, DetectorError> {
    let response: DetectResponse = serde_json::from_str(body)
        .map_err(|err| DetectorError::InvalidPayload(err.to_string()))?;
    if let Some(detection) = &response.detection {
        detection.validate()?;
    }
    Ok(response.detection)
}

fn first_reachable(endpoints: &[String], timeout: Duration) -> Option<String> {
    for endpoint in endpoints {
        match probe_endpoint(endpoint, timeout) {
            Ok(()) => return Some(endpoint.clone()),
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "Detector endpoint unreachable");
            }
        }
    }
    None
}

fn probe_endpoint(endpoint: &str, timeout: Duration) -> Result<(), RemoteError> {
    let parsed = parse_http_url(endpoint)?;
    let addr = resolve(&parsed)?;
    TcpStream::connect_timeout(&addr, timeout).map_err(RemoteError::Connect)?;
    Ok(())
}

#[derive(Debug)]
enum RemoteError {
    InvalidUrl(String),
    Dns(String),
    Connect(std::io::Error),
    Io(std::io::Error),
    Http(u16, String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
            RemoteError::Dns(msg) => write!(f, "dns error: {msg}"),
            RemoteError::Connect(err) => write!(f, "connect error: {err}"),
            RemoteError::Io(err) => write!(f, "io error: {err}"),
            RemoteError::Http(code, body) => {
                write!(f, "http status {code} ({})", body.trim())
            }
        }
    }
}

impl From<RemoteError> for DetectorError {
    fn from(err: RemoteError) -> Self {
        DetectorError::Transient(err.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, RemoteError> {
    let trimmed = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| RemoteError::InvalidUrl("only http:// supported".to_string()))?;

    let mut parts = trimmed.splitn(2, '/');
    let host_port = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RemoteError::InvalidUrl("missing host".to_string()))?;
    let path = match parts.next() {
        Some(path) if !path.is_empty() => format!("/{path}"),
        _ => "/".to_string(),
    };

    let mut host_parts = host_port.splitn(2, ':');
    let host = host_parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RemoteError::InvalidUrl("missing host".to_string()))?;
    let port = match host_parts.next() {
        Some(port_str) if !port_str.is_empty() => port_str
            .parse::<u16>()
            .map_err(|_| RemoteError::InvalidUrl("invalid port".to_string()))?,
        _ => 80,
    };

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path,
    })
}

fn resolve(parsed: &ParsedUrl) -> Result<SocketAddr, RemoteError> {
    (parsed.host.as_str(), parsed.port)
        .to_socket_addrs()
        .map_err(|err| RemoteError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| RemoteError::Dns("no addresses resolved".to_string()))
}

fn send_http_frame(endpoint: &str, frame: &[u8], timeout: Duration) -> Result<String, RemoteError> {
    let parsed = parse_http_url(endpoint)?;
    let addr = resolve(&parsed)?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout).map_err(RemoteError::Connect)?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(RemoteError::Io)?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(RemoteError::Io)?;

    let head = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/octet-stream\r\nAccept: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        parsed.path,
        parsed.host,
        frame.len()
    );
    stream.write_all(head.as_bytes()).map_err(RemoteError::Io)?;
    stream.write_all(frame).map_err(RemoteError::Io)?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).map_err(RemoteError::Io)?;
    let response = String::from_utf8_lossy(&raw);

    let (headers, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| RemoteError::Http(0, "invalid http response".to_string()))?;

    let status_line = headers
        .lines()
        .next()
        .ok_or_else(|| RemoteError::Http(0, "missing status line".to_string()))?;
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| RemoteError::Http(0, "missing status code".to_string()))?
        .parse::<u16>()
        .map_err(|_| RemoteError::Http(0, "invalid status code".to_string()))?;

    if status_code >= 400 {
        return Err(RemoteError::Http(status_code, body.to_string()));
    }

    Ok(body.to_string())
}
