//! Camera sampler: owns the capture device and the fixed-period detection loop.
//!
//! Lifecycle is `idle -> starting -> running -> stopped`. `stop()` may be
//! called at any point and as often as needed; a `start()` that is still in
//! flight notices it at its next await point and unwinds quietly.

use crate::camera::{CameraDevice, Frame, FrameSource};
use crate::detector::{Detection, FaceDetector};
use crate::error::{AppError, SamplerError};
use crate::scoring;
use crate::state::{EngagementSample, EngagementStore, FailureReason, SamplerStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_STABILIZATION_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_NO_FACE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSettings {
    pub interval: Duration,
    /// Wait between attaching the stream and the first tick.
    pub stabilization_delay: Duration,
    pub no_face_grace: Duration,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
            stabilization_delay: DEFAULT_STABILIZATION_DELAY,
            no_face_grace: DEFAULT_NO_FACE_GRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub ticks: u64,
    pub skipped: u64,
    pub detections: u64,
    pub misses: u64,
    pub failures: u64,
    pub last_detection: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Scored { face: bool },
    NotReady,
    /// The previous tick was still running.
    Busy,
    DetectorFailed,
    /// The sampler was stopped; nothing was written.
    Abandoned,
    StoreUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Present,
    /// Face seen again after an absence longer than the grace window.
    Returned,
    Missing,
    /// The absence just crossed the grace window.
    WentAway,
}

#[derive(Debug)]
struct PresenceTracker {
    last_seen: Instant,
    away: bool,
}

impl PresenceTracker {
    fn new(now: Instant) -> Self {
        Self {
            last_seen: now,
            away: false,
        }
    }

    fn observe(&mut self, face: bool, now: Instant, grace: Duration) -> Presence {
        if face {
            self.last_seen = now;
            if std::mem::replace(&mut self.away, false) {
                return Presence::Returned;
            }
            return Presence::Present;
        }
        if !self.away && now.saturating_duration_since(self.last_seen) > grace {
            self.away = true;
            return Presence::WentAway;
        }
        Presence::Missing
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CameraSampler<C, D> {
    camera: C,
    detector: D,
    store: Arc<RwLock<EngagementStore>>,
    settings: SamplerSettings,
    phase: Mutex<Phase>,
    alive: AtomicBool,
    busy: AtomicBool,
    frames: Arc<Mutex<FrameSource>>,
    presence: Mutex<PresenceTracker>,
    stats: Mutex<SamplerStats>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C, D> CameraSampler<C, D>
where
    C: CameraDevice + 'static,
    D: FaceDetector + 'static,
{
    pub fn new(
        camera: C,
        detector: D,
        store: Arc<RwLock<EngagementStore>>,
        settings: SamplerSettings,
    ) -> Self {
        Self {
            camera,
            detector,
            store,
            settings,
            phase: Mutex::new(Phase::Idle),
            alive: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            frames: Arc::new(Mutex::new(FrameSource::new())),
            presence: Mutex::new(PresenceTracker::new(Instant::now())),
            stats: Mutex::new(SamplerStats::default()),
            task: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> SamplerStats {
        *lock(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        *lock(&self.phase) == Phase::Running
    }

    /// Prepare the detector, acquire the camera, wait for the stream to
    /// settle and start polling.
    ///
    /// Camera and detector-availability errors are terminal: they are
    /// recorded as a failed sampler status and returned.
    pub async fn start(self: &Arc<Self>) -> Result<(), SamplerError> {
        {
            let mut phase = lock(&self.phase);
            match *phase {
                Phase::Idle => *phase = Phase::Starting,
                Phase::Stopped => {
                    debug!("Sampler stopped before start, nothing to do");
                    return Ok(());
                }
                Phase::Starting | Phase::Running => return Err(SamplerError::AlreadyStarted),
            }
        }
        self.alive.store(true, Ordering::SeqCst);
        self.set_status(SamplerStatus::Starting);
        info!(
            interval_ms = self.settings.interval.as_millis(),
            stabilization_ms = self.settings.stabilization_delay.as_millis(),
            "Starting camera sampler"
        );

        if let Err(err) = self.detector.prepare().await {
            return self.fail(err.into());
        }
        if !self.still_starting() {
            return Ok(());
        }

        let mut stream = match self.camera.acquire().await {
            Ok(stream) => stream,
            Err(err) => return self.fail(err.into()),
        };
        if !self.still_starting() {
            stream.stop_tracks();
            return Ok(());
        }
        lock(&self.frames).attach(stream);
        info!("Camera access granted");

        tokio::time::sleep(self.settings.stabilization_delay).await;
        if !self.still_starting() {
            lock(&self.frames).release();
            return Ok(());
        }

        *lock(&self.presence) = PresenceTracker::new(Instant::now());
        let handle = tokio::spawn(Arc::clone(self).run());
        {
            let mut phase = lock(&self.phase);
            if *phase != Phase::Starting {
                handle.abort();
                return Ok(());
            }
            *phase = Phase::Running;
            *lock(&self.task) = Some(handle);
        }
        self.set_status(SamplerStatus::Active);
        info!("Face detection active");
        Ok(())
    }

    /// Cancel polling and release the camera. Idempotent.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *lock(&self.phase), Phase::Stopped);
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        lock(&self.frames).release();

        if previous == Phase::Stopped {
            return;
        }
        info!("Camera sampler stopped");
        match self.store.write() {
            Ok(mut store) => {
                if !matches!(store.sampler_status(), SamplerStatus::Failed { .. }) {
                    store.set_sampler_status(SamplerStatus::Stopped);
                }
            }
            Err(_) => warn!("State lock poisoned while recording sampler stop"),
        }
    }

    /// Run one detection cycle against the attached stream.
    pub async fn tick(&self) -> TickOutcome {
        if !self.alive.load(Ordering::SeqCst) {
            return TickOutcome::Abandoned;
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("Previous detection still running, skipping tick");
            lock(&self.stats).skipped += 1;
            return TickOutcome::Busy;
        };

        let Some(frame) = self.grab_frame().await else {
            lock(&self.stats).skipped += 1;
            return TickOutcome::NotReady;
        };
        lock(&self.stats).ticks += 1;

        let result = self.detector.detect(&frame).await;
        if !self.alive.load(Ordering::SeqCst) {
            debug!("Dropping detection result that arrived after teardown");
            return TickOutcome::Abandoned;
        }

        let detection = match result {
            Ok(detection) => detection,
            Err(err) => {
                warn!(error = %err, "Face detection error");
                lock(&self.stats).failures += 1;
                return TickOutcome::DetectorFailed;
            }
        };

        let now = SystemTime::now();
        let face = detection.is_some();
        self.track_presence(face, now);

        match self.publish(detection.as_ref(), now) {
            Ok(sample) => {
                match &detection {
                    Some(found) => debug!(
                        score = sample.score,
                        level = %sample.level,
                        attention = sample.focus_metrics.attention,
                        participation = sample.focus_metrics.participation,
                        comprehension = sample.focus_metrics.comprehension,
                        dominant = found.expressions.dominant().as_str(),
                        "Engagement detected"
                    ),
                    None => debug!(
                        participation = sample.focus_metrics.participation,
                        "No face detected"
                    ),
                }
                TickOutcome::Scored { face }
            }
            Err(err) => {
                error!(error = %err, "Failed to publish engagement sample");
                TickOutcome::StoreUnavailable
            }
        }
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; polling starts one period in.
        ticker.tick().await;

        let mut in_flight = JoinSet::new();
        loop {
            ticker.tick().await;
            while in_flight.try_join_next().is_some() {}
            if !self.alive.load(Ordering::SeqCst) {
                break;
            }
            let sampler = Arc::clone(&self);
            in_flight.spawn(async move { sampler.tick().await });
        }
    }

    /// Pull the current frame on the blocking pool; snapshot streams read
    /// from disk.
    async fn grab_frame(&self) -> Option<Frame> {
        let frames = Arc::clone(&self.frames);
        match tokio::task::spawn_blocking(move || lock(&frames).current_frame()).await {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Frame grab task failed");
                None
            }
        }
    }

    fn publish(
        &self,
        detection: Option<&Detection>,
        timestamp: SystemTime,
    ) -> Result<EngagementSample, AppError> {
        let (sample, change) = {
            let mut store = self.store.write().map_err(|_| AppError::StateLock)?;
            let previous_participation = store.latest().focus_metrics.participation;
            let sample = scoring::score_outcome(detection, previous_participation, timestamp);
            (sample, store.publish(sample))
        };
        if let Some(change) = change {
            change.notify();
        }
        Ok(sample)
    }

    fn track_presence(&self, face: bool, now: SystemTime) {
        let presence = lock(&self.presence).observe(face, Instant::now(), self.settings.no_face_grace);
        let mut stats = lock(&self.stats);
        if face {
            stats.detections += 1;
            stats.last_detection = Some(now);
        } else {
            stats.misses += 1;
        }
        drop(stats);

        match presence {
            Presence::WentAway => info!(
                grace_ms = self.settings.no_face_grace.as_millis(),
                "No face detected beyond grace window"
            ),
            Presence::Returned => info!("Face detected again"),
            Presence::Present | Presence::Missing => {}
        }
    }

    fn still_starting(&self) -> bool {
        *lock(&self.phase) == Phase::Starting
    }

    fn fail(&self, err: SamplerError) -> Result<(), SamplerError> {
        if !self.still_starting() {
            debug!(error = %err, "Ignoring start failure after stop");
            return Ok(());
        }
        *lock(&self.phase) = Phase::Stopped;
        self.alive.store(false, Ordering::SeqCst);
        lock(&self.frames).release();

        error!(error = %err, "Camera sampler failed to start");
        if let Some(reason) = FailureReason::from_sampler_error(&err) {
            self.set_status(SamplerStatus::Failed {
                reason,
                message: err.to_string(),
            });
        }
        Err(err)
    }

    fn set_status(&self, status: SamplerStatus) {
        match self.store.write() {
            Ok(mut store) => store.set_sampler_status(status),
            Err(_) => warn!("State lock poisoned while updating sampler status"),
        }
    }
}
