//! One monitoring session: capture, detection loop, settings and the alert
//! lifecycle wired together.
//!
//! Detections only ever move the alert machine out of `Idle` through the
//! loop's publish path; every other transition comes from an explicit user
//! call on the session. No lock is held while waiting on another one, on a
//! position fix or on the record store.

use crate::alert::{AlertError, AlertPhase, AlertState, AlertStateMachine, Notifier, Transition};
use crate::device::{CaptureSession, DeviceSelection, LocationTracker};
use crate::interface::{CapabilityError, CapabilityProvider, FrameSource};
use crate::policy::{aggregate, SensitivityLevel};
use crate::prelude::{Detection, DetectionModel};
use crate::processing::{
    DetectionLoop, DetectionSink, FrameScorer, LoopHandle, LoopState, ModelHandle, ModelState,
    DEFAULT_TICK,
};
use crate::settings::{KeyValueStore, Settings, SettingsManager};
use crate::store::AlertStore;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick: Duration,
    pub location_timeout: Duration,
    pub device_selection: DeviceSelection,
    pub user_id: i64,
    pub contact_id: Option<i64>,
    pub labels: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            location_timeout: Duration::from_secs(15),
            device_selection: DeviceSelection::default(),
            user_id: 1,
            contact_id: None,
            labels: Vec::new(),
        }
    }
}

/// Point-in-time view for a status indicator.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub model: ModelState,
    pub detection: LoopState,
    pub alert: AlertPhase,
    pub latest_detections: usize,
    pub battery_percent: Option<f32>,
    pub wake_lock: bool,
    pub location_enabled: bool,
    pub location_degraded: bool,
    pub camera: Option<String>,
    pub camera_degraded: bool,
    pub torch: bool,
}

struct AlertPublisher<P: CapabilityProvider> {
    alerts: Arc<Mutex<AlertStateMachine>>,
    capture: Arc<Mutex<CaptureSession<P>>>,
    settings: watch::Receiver<Settings>,
    latest: watch::Sender<Vec<Detection>>,
}

impl<P: CapabilityProvider> DetectionSink for AlertPublisher<P> {
    async fn publish(&self, detections: Vec<Detection>) {
        let settings = *self.settings.borrow();
        let source = self.capture.lock().await.source();
        self.alerts
            .lock()
            .await
            .on_detections(&detections, &settings, || {
                source.as_ref().and_then(|source| source.capture_still())
            });
        self.latest.send_replace(detections);
    }
}

pub struct MonitoringSession<P: CapabilityProvider, M, S, K> {
    provider: Arc<P>,
    capture: Arc<Mutex<CaptureSession<P>>>,
    location: LocationTracker<P>,
    settings: SettingsManager<K>,
    alerts: Arc<Mutex<AlertStateMachine>>,
    dispatch: Mutex<()>,
    store: Arc<S>,
    model: ModelHandle<M>,
    metrics: Arc<MetricsRecorder>,
    latest: watch::Receiver<Vec<Detection>>,
    detection: LoopHandle,
    wake_lock: bool,
    logger: LogManager,
}

impl<P, M, S, K> MonitoringSession<P, M, S, K>
where
    P: CapabilityProvider,
    M: DetectionModel,
    S: AlertStore,
    K: KeyValueStore,
{
    /// Loads settings, acquires device capabilities and starts the detection
    /// loop. Capability failures degrade the session instead of failing it.
    pub async fn start(
        config: SessionConfig,
        provider: Arc<P>,
        model: ModelHandle<M>,
        store: Arc<S>,
        namespace: K,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let logger = LogManager::new("session");
        let settings = SettingsManager::load(namespace);
        let current = settings.current();

        let wake_lock = match provider.request_wake_lock() {
            Ok(()) => true,
            Err(err) => {
                logger.warn(&format!("screen wake lock unavailable: {}", err));
                false
            }
        };

        let mut capture = CaptureSession::new(provider.clone(), config.device_selection.clone());
        if let Err(err) = capture.start().await {
            logger.warn(&format!("camera unavailable, running degraded: {}", err));
        }
        let capture = Arc::new(Mutex::new(capture));

        let location = LocationTracker::new(
            provider.clone(),
            config.location_timeout,
            current.location_enabled,
        );

        let mut machine = AlertStateMachine::new(config.user_id, notifier);
        machine.set_contact(config.contact_id);
        let alerts = Arc::new(Mutex::new(machine));

        let (latest_tx, latest) = watch::channel(Vec::new());
        let publisher = AlertPublisher {
            alerts: alerts.clone(),
            capture: capture.clone(),
            settings: settings.subscribe(),
            latest: latest_tx,
        };

        let metrics = Arc::new(MetricsRecorder::new());
        let scorer = FrameScorer::new(model.clone()).with_labels(config.labels.clone());
        let detection = DetectionLoop::new(
            scorer,
            model.clone(),
            capture.clone(),
            settings.subscribe(),
            publisher,
        )
        .with_tick(config.tick)
        .with_metrics(metrics.clone())
        .spawn();

        logger.record(&format!(
            "session started (sensitivity {}, detection {})",
            current.sensitivity,
            if current.ai_active { "on" } else { "off" }
        ));

        Self {
            provider,
            capture,
            location,
            settings,
            alerts,
            dispatch: Mutex::new(()),
            store,
            model,
            metrics,
            latest,
            detection,
            wake_lock,
            logger,
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    pub fn toggle_ai(&self) -> Settings {
        self.settings.toggle_ai()
    }

    pub fn set_sensitivity(&self, level: SensitivityLevel) -> Settings {
        self.settings.set_sensitivity(level)
    }

    pub fn toggle_notifications(&self) -> Settings {
        self.settings.toggle_notifications()
    }

    pub fn toggle_location(&self) -> Settings {
        let settings = self.settings.toggle_location();
        self.location.set_enabled(settings.location_enabled);
        settings
    }

    pub async fn flip_camera(&self) -> Result<(), CapabilityError> {
        self.capture.lock().await.flip().await
    }

    pub async fn switch_camera(&self, device_id: &str) -> Result<(), CapabilityError> {
        self.capture.lock().await.switch_to(device_id).await
    }

    pub async fn toggle_torch(&self) -> bool {
        self.capture.lock().await.toggle_torch()
    }

    /// Emergency button: raises an alert without waiting for a detection.
    pub async fn escalate(&self) -> Transition {
        let confidence = aggregate(&self.latest.borrow()) * 100.0;
        let source = self.capture.lock().await.source();
        self.alerts.lock().await.escalate(confidence, || {
            source.as_ref().and_then(|source| source.capture_still())
        })
    }

    /// Sends the pending alert with the current position.
    ///
    /// Confirmations run one at a time. The position lookup and the store
    /// write happen without holding the alert lock, so detection cycles and
    /// status reads keep going while they are in flight.
    pub async fn confirm(&self) -> Result<Transition, AlertError> {
        let _dispatching = self.dispatch.lock().await;
        if self.alert_phase().await != AlertPhase::PendingConfirmation {
            return Ok(Transition::Ignored);
        }

        let coordinates = self.location.current().await;
        if self.location.is_degraded() {
            self.settings.set_location_enabled(false);
        }

        let prepared = self.alerts.lock().await.prepare_dispatch(coordinates)?;
        let Some(dispatch) = prepared else {
            return Ok(Transition::Ignored);
        };
        let result = self.store.create_alert(dispatch.alert).await;
        self.alerts
            .lock()
            .await
            .finish_dispatch(dispatch.raised_at, result)
    }

    pub async fn cancel(&self) -> Transition {
        self.alerts.lock().await.cancel()
    }

    pub async fn acknowledge(&self) -> Transition {
        self.alerts.lock().await.acknowledge()
    }

    pub async fn alert_state(&self) -> AlertState {
        self.alerts.lock().await.state().clone()
    }

    pub async fn alert_phase(&self) -> AlertPhase {
        self.alerts.lock().await.phase()
    }

    pub fn latest_detections(&self) -> Vec<Detection> {
        self.latest.borrow().clone()
    }

    pub fn loop_state(&self) -> LoopState {
        self.detection.state()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn status(&self) -> SessionStatus {
        let (camera, camera_degraded, torch) = {
            let capture = self.capture.lock().await;
            (
                capture.device_id().map(str::to_string),
                !capture.is_open(),
                capture.torch_enabled(),
            )
        };
        let alert = self.alert_phase().await;
        let latest_detections = self.latest.borrow().len();
        SessionStatus {
            model: self.model.state(),
            detection: self.detection.state(),
            alert,
            latest_detections,
            battery_percent: self.provider.battery_level().ok(),
            wake_lock: self.wake_lock,
            location_enabled: self.location.is_enabled(),
            location_degraded: self.location.is_degraded(),
            camera,
            camera_degraded,
            torch,
        }
    }

    /// Stops the detection loop and releases the camera. No cycle runs after
    /// this returns.
    pub async fn teardown(self) {
        self.detection.teardown().await;
        self.logger.record("session ended");
    }
}
