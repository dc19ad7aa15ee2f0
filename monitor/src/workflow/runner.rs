use crate::generator::profile::{SyntheticModel, SyntheticProvider};
use crate::workflow::config::MonitorConfig;
use anyhow::Context;
use fireguardcore::alert::{AlertState, LogNotifier, Transition};
use fireguardcore::processing::model_slot;
use fireguardcore::session::{MonitoringSession, SessionStatus};
use fireguardcore::settings::{FileNamespace, KeyValueStore, MemoryNamespace};
use fireguardcore::store::AlertStore;
use fireguardcore::telemetry::MetricsSnapshot;
use log::{info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct RunSummary {
    pub metrics: MetricsSnapshot,
    pub alerts_raised: usize,
    pub alerts_sent: usize,
    pub alerts_cancelled: usize,
    pub dispatch_failures: usize,
    pub status: SessionStatus,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles {}, failed {}, suspended ticks {}, detections {} | alerts raised {}, sent {}, cancelled {}, dispatch failures {}",
            self.metrics.cycles,
            self.metrics.errors,
            self.metrics.suspended,
            self.metrics.detections,
            self.alerts_raised,
            self.alerts_sent,
            self.alerts_cancelled,
            self.dispatch_failures
        )
    }
}

/// Drives a monitoring session against the synthetic camera and plays the
/// user: pending alerts are confirmed when `auto_confirm` is set and
/// cancelled otherwise.
#[derive(Clone)]
pub struct Runner {
    config: MonitorConfig,
}

impl Runner {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub async fn simulate<S: AlertStore>(&self, store: Arc<S>) -> anyhow::Result<RunSummary> {
        match &self.config.settings_dir {
            Some(dir) => {
                let namespace = FileNamespace::new(dir)
                    .with_context(|| format!("opening settings namespace {}", dir.display()))?;
                Ok(self.drive(store, namespace).await)
            }
            None => Ok(self.drive(store, MemoryNamespace::new()).await),
        }
    }

    async fn drive<S: AlertStore, K: KeyValueStore>(
        &self,
        store: Arc<S>,
        namespace: K,
    ) -> RunSummary {
        let simulation = &self.config.simulation;
        let provider = Arc::new(SyntheticProvider::new(simulation.clone()));
        let (loader, model) = model_slot();
        loader.complete(Ok(SyntheticModel));

        let session = MonitoringSession::start(
            self.config.to_session_config(),
            provider,
            model,
            store,
            namespace,
            Arc::new(LogNotifier::new()),
        )
        .await;

        let poll = Duration::from_millis(self.config.tick_ms.max(1) * 3);
        let deadline = Instant::now() + Duration::from_millis(simulation.duration_ms);
        let mut alerts_raised = 0;
        let mut alerts_sent = 0;
        let mut alerts_cancelled = 0;
        let mut dispatch_failures = 0;
        let mut retrying = false;

        while Instant::now() < deadline {
            tokio::time::sleep(poll).await;
            let AlertState::PendingConfirmation(pending) = session.alert_state().await else {
                continue;
            };
            if !retrying {
                alerts_raised += 1;
                info!(
                    "alert pending: {:.1}% ({})",
                    pending.confidence,
                    if pending.snapshot.is_some() {
                        "with snapshot"
                    } else {
                        "no snapshot"
                    }
                );
            }

            if !simulation.auto_confirm {
                session.cancel().await;
                alerts_cancelled += 1;
                retrying = false;
                continue;
            }

            match session.confirm().await {
                Ok(Transition::Dispatched) => {
                    alerts_sent += 1;
                    retrying = false;
                    session.acknowledge().await;
                }
                Ok(_) => retrying = false,
                Err(err) => {
                    dispatch_failures += 1;
                    retrying = true;
                    warn!("alert dispatch failed, will retry: {}", err);
                }
            }
        }

        let status = session.status().await;
        let metrics = session.metrics();
        session.teardown().await;

        RunSummary {
            metrics,
            alerts_raised,
            alerts_sent,
            alerts_cancelled,
            dispatch_failures,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::SimulationConfig;
    use fireguardcore::interface::AlertStatus;
    use fireguardcore::processing::LoopState;
    use fireguardcore::settings::SETTINGS_KEY;
    use fireguardcore::store::MemoryStore;
    use tempfile::tempdir;

    fn config(fire_probability: f64, auto_confirm: bool) -> MonitorConfig {
        MonitorConfig {
            tick_ms: 10,
            simulation: SimulationConfig {
                seed: 21,
                duration_ms: 1_000,
                fire_probability,
                frame_width: 32,
                frame_height: 24,
                auto_confirm,
            },
            ..MonitorConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burning_scene_dispatches_alerts_with_evidence() {
        let store = Arc::new(MemoryStore::new());
        let summary = Runner::new(config(1.0, true))
            .simulate(store.clone())
            .await
            .unwrap();

        assert!(summary.metrics.cycles > 0);
        assert!(summary.alerts_sent >= 1);
        assert_eq!(summary.dispatch_failures, 0);

        let stored = store.alerts_by_user(1).await.unwrap();
        assert_eq!(stored.len(), summary.alerts_sent);
        assert!(stored.iter().all(|alert| alert.status == AlertStatus::Sent));
        assert!(stored.iter().all(|alert| alert.image_data.is_some()));
        assert!(stored.iter().all(|alert| alert.confidence > 90.0));
    }

    #[tokio::test(start_paused = true)]
    async fn calm_scene_never_raises() {
        let store = Arc::new(MemoryStore::new());
        let summary = Runner::new(config(0.0, true))
            .simulate(store.clone())
            .await
            .unwrap();

        assert!(summary.metrics.cycles > 0);
        assert_eq!(summary.metrics.detections, 0);
        assert_eq!(summary.alerts_raised, 0);
        assert!(store.alerts_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn without_auto_confirm_alerts_are_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let summary = Runner::new(config(1.0, false))
            .simulate(store.clone())
            .await
            .unwrap();

        assert!(summary.alerts_raised >= 1);
        assert_eq!(summary.alerts_cancelled, summary.alerts_raised);
        assert!(store.alerts_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cached_settings_can_start_with_detection_off() {
        let dir = tempdir().unwrap();
        FileNamespace::new(dir.path())
            .unwrap()
            .set(SETTINGS_KEY, r#"{"aiActive":false}"#)
            .unwrap();
        let mut cfg = config(1.0, true);
        cfg.settings_dir = Some(dir.path().to_path_buf());

        let summary = Runner::new(cfg)
            .simulate(Arc::new(MemoryStore::new()))
            .await
            .unwrap();

        assert_eq!(summary.metrics.cycles, 0);
        assert_eq!(summary.alerts_raised, 0);
        assert_eq!(summary.status.detection, LoopState::Suspended);
    }
}
