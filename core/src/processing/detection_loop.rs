use crate::device::CaptureSession;
use crate::interface::{CapabilityProvider, FrameSource, ReadyState};
use crate::prelude::{Detection, DetectionModel};
use crate::processing::model::ModelHandle;
use crate::processing::scorer::FrameScorer;
use crate::settings::Settings;
use crate::telemetry::{LogManager, MetricsRecorder};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Default pause between cycles, roughly one display refresh.
pub const DEFAULT_TICK: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Stopped,
    Running,
    Suspended,
}

/// Receives the detection set of every completed cycle.
pub trait DetectionSink: Send + Sync + 'static {
    fn publish(&self, detections: Vec<Detection>) -> impl Future<Output = ()> + Send;
}

/// Self-rescheduling sampling loop. The next cycle is only scheduled after the
/// current one has published, so cycles never overlap.
pub struct DetectionLoop<P: CapabilityProvider, M, K> {
    scorer: FrameScorer<M>,
    model: ModelHandle<M>,
    capture: Arc<Mutex<CaptureSession<P>>>,
    settings: watch::Receiver<Settings>,
    sink: K,
    tick: Duration,
    metrics: Arc<MetricsRecorder>,
    state: watch::Sender<LoopState>,
    logger: LogManager,
}

/// Owner side of a spawned loop. Dropping it without `teardown` still stops
/// the loop at its next suspension point.
pub struct LoopHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<LoopState>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// Cancels the pending cycle, waits for the loop to exit and for the
    /// capture source to be released.
    pub async fn teardown(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            LogManager::new("detection-loop")
                .error(&format!("detection loop task ended abnormally: {}", err));
        }
    }
}

impl<P, M, K> DetectionLoop<P, M, K>
where
    P: CapabilityProvider,
    M: DetectionModel,
    K: DetectionSink,
{
    pub fn new(
        scorer: FrameScorer<M>,
        model: ModelHandle<M>,
        capture: Arc<Mutex<CaptureSession<P>>>,
        settings: watch::Receiver<Settings>,
        sink: K,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Stopped);
        Self {
            scorer,
            model,
            capture,
            settings,
            sink,
            tick: DEFAULT_TICK,
            metrics: Arc::new(MetricsRecorder::new()),
            state,
            logger: LogManager::new("detection-loop"),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn spawn(self) -> LoopHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));
        LoopHandle {
            shutdown,
            state,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let loaded = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            model = self.model.wait_loaded() => Some(model.is_some()),
        };

        match loaded {
            Some(true) => {
                self.logger.record("model ready, sampling frames");
                self.cycle_until_shutdown(&mut shutdown).await;
            }
            Some(false) => {
                self.logger
                    .error("model unavailable, detection stays stopped");
                let _ = shutdown.changed().await;
            }
            None => {}
        }

        self.state.send_replace(LoopState::Stopped);
        self.capture.lock().await.release();
        self.logger.record("detection loop torn down");
    }

    async fn cycle_until_shutdown(&mut self, shutdown: &mut watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.tick) => {}
            }

            let settings = *self.settings.borrow();
            if !settings.ai_active {
                self.enter(LoopState::Suspended, "detection toggled off");
                continue;
            }

            let source = self.capture.lock().await.source();
            let frame = source
                .filter(|source| source.ready_state() == ReadyState::ReadyForCapture)
                .and_then(|source| source.current_frame());
            let Some(frame) = frame else {
                self.enter(LoopState::Suspended, "capture source not ready");
                continue;
            };
            self.enter(LoopState::Running, "capture source ready");

            let threshold = settings.sensitivity.threshold();
            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                outcome = self.scorer.score(&frame, threshold) => outcome,
            };
            drop(frame);

            match outcome {
                Ok(detections) => {
                    self.metrics.record_cycle(detections.len());
                    self.sink.publish(detections).await;
                }
                Err(err) => {
                    self.metrics.record_error();
                    self.logger.warn(&format!("detection cycle failed: {}", err));
                }
            }
        }
    }

    fn enter(&self, next: LoopState, reason: &str) {
        if next == LoopState::Suspended {
            self.metrics.record_suspended();
        }
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            self.logger.record(&format!("{:?}: {}", next, reason));
        }
    }
}
