//! In-process doubles shared by the unit tests.

use crate::alert::{AlertCue, Notifier};
use crate::interface::{
    AlertRecord, AlertStatus, CapabilityError, CapabilityProvider, Coordinates, FrameSource,
    NewAlert, ReadyState, VideoDevice,
};
use crate::prelude::{Detection, DetectionModel, Frame, RawCandidate, ScoreResult};
use crate::processing::DetectionSink;
use crate::store::{AlertStore, MemoryStore, StoreError, StoreResult};
use chrono::Utc;
use ndarray::Array3;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn sample_fix() -> Coordinates {
    Coordinates {
        latitude: 37.7749,
        longitude: -122.4194,
        accuracy: 12.0,
        timestamp: Utc::now(),
    }
}

/// Model that replays scripted results, then repeats a fallback forever.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ScoreResult<Vec<RawCandidate>>>>,
    fallback: Vec<RawCandidate>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn always(candidates: Vec<RawCandidate>) -> Self {
        Self::scripted(Vec::new(), candidates)
    }

    pub fn scripted(
        script: Vec<ScoreResult<Vec<RawCandidate>>>,
        fallback: Vec<RawCandidate>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl DetectionModel for ScriptedModel {
    async fn infer(&self, _frame: &Frame) -> ScoreResult<Vec<RawCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[derive(Default)]
struct SourceProbe {
    not_ready: AtomicBool,
    stops: AtomicUsize,
    stills: AtomicUsize,
    frames: AtomicU64,
    events: Mutex<Vec<String>>,
}

/// Capability provider with scriptable devices, readiness and location.
pub struct MockProvider {
    devices: Vec<VideoDevice>,
    probe: Arc<SourceProbe>,
    torch_supported: bool,
    location: Mutex<Result<Coordinates, CapabilityError>>,
    location_delay: Duration,
    open_error: Mutex<Option<CapabilityError>>,
    battery: Result<f32, CapabilityError>,
    wake_lock: Result<(), CapabilityError>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            devices: vec![VideoDevice::new("camera-0", "Rear camera")],
            probe: Arc::new(SourceProbe::default()),
            torch_supported: true,
            location: Mutex::new(Ok(sample_fix())),
            location_delay: Duration::ZERO,
            open_error: Mutex::new(None),
            battery: Ok(80.0),
            wake_lock: Ok(()),
        }
    }
}

impl MockProvider {
    pub fn with_devices(devices: Vec<VideoDevice>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    pub fn without_torch(mut self) -> Self {
        self.torch_supported = false;
        self
    }

    pub fn without_battery(mut self) -> Self {
        self.battery = Err(CapabilityError::Unsupported);
        self
    }

    pub fn without_wake_lock(mut self) -> Self {
        self.wake_lock = Err(CapabilityError::Unsupported);
        self
    }

    pub fn with_location_delay(mut self, delay: Duration) -> Self {
        self.location_delay = delay;
        self
    }

    pub fn set_location(&self, result: Result<Coordinates, CapabilityError>) {
        *self.location.lock().unwrap() = result;
    }

    /// Makes every following `open` fail with `error`; `None` heals it.
    pub fn fail_open(&self, error: Option<CapabilityError>) {
        *self.open_error.lock().unwrap() = error;
    }

    pub fn set_ready(&self, ready: bool) {
        self.probe.not_ready.store(!ready, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<String> {
        self.probe.events.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.probe.stops.load(Ordering::SeqCst)
    }

    pub fn still_count(&self) -> usize {
        self.probe.stills.load(Ordering::SeqCst)
    }
}

pub struct MockSource {
    device_id: String,
    probe: Arc<SourceProbe>,
    torch_supported: bool,
    stopped: AtomicBool,
}

impl FrameSource for MockSource {
    fn ready_state(&self) -> ReadyState {
        if self.stopped.load(Ordering::SeqCst) || self.probe.not_ready.load(Ordering::SeqCst) {
            ReadyState::NotReady
        } else {
            ReadyState::ReadyForCapture
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        if self.ready_state() != ReadyState::ReadyForCapture {
            return None;
        }
        let sequence = self.probe.frames.fetch_add(1, Ordering::SeqCst);
        Some(Frame::new(sequence, Array3::from_elem((4, 4, 3), 128)))
    }

    fn capture_still(&self) -> Option<String> {
        self.probe.stills.fetch_add(1, Ordering::SeqCst);
        Some("data:image/jpeg;base64,TU9DSw==".into())
    }

    fn set_torch(&self, _enabled: bool) -> Result<(), CapabilityError> {
        if self.torch_supported {
            Ok(())
        } else {
            Err(CapabilityError::Unsupported)
        }
    }

    fn stop_tracks(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.probe
            .events
            .lock()
            .unwrap()
            .push(format!("stop:{}", self.device_id));
    }
}

impl CapabilityProvider for MockProvider {
    type Source = MockSource;

    fn list_devices(&self) -> Result<Vec<VideoDevice>, CapabilityError> {
        Ok(self.devices.clone())
    }

    async fn open(&self, device_id: Option<&str>) -> Result<MockSource, CapabilityError> {
        let failure = self.open_error.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        let device_id = device_id.unwrap_or("default").to_string();
        self.probe
            .events
            .lock()
            .unwrap()
            .push(format!("open:{}", device_id));
        Ok(MockSource {
            device_id,
            probe: self.probe.clone(),
            torch_supported: self.torch_supported,
            stopped: AtomicBool::new(false),
        })
    }

    async fn coordinates(&self) -> Result<Coordinates, CapabilityError> {
        if !self.location_delay.is_zero() {
            tokio::time::sleep(self.location_delay).await;
        }
        let result = self.location.lock().unwrap().clone();
        result
    }

    fn battery_level(&self) -> Result<f32, CapabilityError> {
        self.battery.clone()
    }

    fn request_wake_lock(&self) -> Result<(), CapabilityError> {
        self.wake_lock.clone()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notified: AtomicUsize,
    silenced: AtomicUsize,
}

impl RecordingNotifier {
    pub fn notified(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }

    pub fn silenced(&self) -> usize {
        self.silenced.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _cue: &AlertCue) {
        self.notified.fetch_add(1, Ordering::SeqCst);
    }

    fn silence(&self) {
        self.silenced.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    published: Arc<Mutex<Vec<Vec<Detection>>>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<Vec<Detection>> {
        self.published.lock().unwrap().clone()
    }
}

impl DetectionSink for RecordingSink {
    async fn publish(&self, detections: Vec<Detection>) {
        self.published.lock().unwrap().push(detections);
    }
}

/// Alert store whose first writes fail with a backend error.
pub struct FlakyStore {
    inner: MemoryStore,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_once() -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: AtomicUsize::new(1),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl AlertStore for FlakyStore {
    async fn create_alert(&self, alert: NewAlert) -> StoreResult<AlertRecord> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.create_alert(alert).await
    }

    async fn alerts_by_user(&self, user_id: i64) -> StoreResult<Vec<AlertRecord>> {
        self.inner.alerts_by_user(user_id).await
    }

    async fn update_alert_status(
        &self,
        id: i64,
        status: AlertStatus,
    ) -> StoreResult<Option<AlertRecord>> {
        self.inner.update_alert_status(id, status).await
    }
}
