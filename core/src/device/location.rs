use crate::interface::{CapabilityError, CapabilityProvider, Coordinates};
use crate::telemetry::LogManager;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cached fixes older than this are not reused when a fresh attempt fails.
const MAX_FIX_AGE: Duration = Duration::from_secs(60);

#[derive(Default)]
struct TrackerState {
    enabled: bool,
    degraded: bool,
    last_fix: Option<Coordinates>,
}

/// Position lookups with a bounded wait.
///
/// A timed-out or failed attempt falls back to the last fix while it is still
/// fresh and otherwise reports no data. A denied permission disables location
/// until the user enables it again. The state lock is never held while a
/// lookup is in flight.
pub struct LocationTracker<P> {
    provider: Arc<P>,
    timeout: Duration,
    state: Mutex<TrackerState>,
    logger: LogManager,
}

impl<P: CapabilityProvider> LocationTracker<P> {
    pub fn new(provider: Arc<P>, timeout: Duration, enabled: bool) -> Self {
        Self {
            provider,
            timeout,
            state: Mutex::new(TrackerState {
                enabled,
                ..TrackerState::default()
            }),
            logger: LogManager::new("location"),
        }
    }

    pub async fn current(&self) -> Option<Coordinates> {
        if !self.is_enabled() {
            return None;
        }

        let attempt = tokio::time::timeout(self.timeout, self.provider.coordinates()).await;
        let mut state = self.state.lock().ok()?;
        match attempt {
            Ok(Ok(fix)) => {
                state.degraded = false;
                state.last_fix = Some(fix.clone());
                Some(fix)
            }
            Ok(Err(CapabilityError::PermissionDenied)) => {
                self.logger
                    .warn("location permission denied, disabling location");
                state.enabled = false;
                state.degraded = true;
                None
            }
            Ok(Err(err)) => {
                self.logger.warn(&format!("location error: {}", err));
                fresh_fix(&state)
            }
            Err(_) => {
                self.logger.warn(&format!(
                    "no position fix within {} ms",
                    self.timeout.as_millis()
                ));
                fresh_fix(&state)
            }
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.enabled = enabled;
            if enabled {
                state.degraded = false;
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().map_or(false, |state| state.enabled)
    }

    /// Permission was denied; the session runs without location.
    pub fn is_degraded(&self) -> bool {
        self.state.lock().map_or(false, |state| state.degraded)
    }
}

fn fresh_fix(state: &TrackerState) -> Option<Coordinates> {
    let max_age = chrono::Duration::from_std(MAX_FIX_AGE).ok()?;
    state
        .last_fix
        .as_ref()
        .filter(|fix| Utc::now() - fix.timestamp <= max_age)
        .cloned()
}
