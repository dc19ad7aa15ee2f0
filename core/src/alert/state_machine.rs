use crate::alert::notifier::{AlertCue, Notifier};
use crate::interface::{AlertRecord, AlertStatus, Coordinates, NewAlert};
use crate::policy::{aggregate, qualifies};
use crate::prelude::Detection;
use crate::settings::Settings;
use crate::store::{AlertStore, StoreError, StoreResult};
use crate::telemetry::LogManager;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("coordinates unavailable, alert cannot be dispatched")]
    CoordinatesUnavailable,
    #[error("alert could not be persisted: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    Detection,
    Manual,
}

/// Record ready to be written for a confirmed alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub alert: NewAlert,
    pub raised_at: DateTime<Utc>,
}

/// Alert awaiting the user's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub trigger: AlertTrigger,
    /// Percent, `aggregate * 100`.
    pub confidence: f32,
    pub snapshot: Option<String>,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertState {
    Idle,
    PendingConfirmation(PendingAlert),
    Sent(AlertRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    Idle,
    PendingConfirmation,
    Sent,
}

/// Outcome of feeding one trigger to the machine. Triggers that do not apply
/// to the current state are `Ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Raised,
    Dispatched,
    Cancelled,
    Acknowledged,
    Ignored,
}

/// Owns the idle / pending / sent lifecycle of a monitoring session.
pub struct AlertStateMachine {
    state: AlertState,
    user_id: i64,
    contact_id: Option<i64>,
    notifier: Arc<dyn Notifier>,
    logger: LogManager,
}

impl AlertStateMachine {
    pub fn new(user_id: i64, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: AlertState::Idle,
            user_id,
            contact_id: None,
            notifier,
            logger: LogManager::new("alert"),
        }
    }

    /// Contact referenced by dispatched alerts.
    pub fn set_contact(&mut self, contact_id: Option<i64>) {
        self.contact_id = contact_id;
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn phase(&self) -> AlertPhase {
        match self.state {
            AlertState::Idle => AlertPhase::Idle,
            AlertState::PendingConfirmation(_) => AlertPhase::PendingConfirmation,
            AlertState::Sent(_) => AlertPhase::Sent,
        }
    }

    pub fn pending(&self) -> Option<&PendingAlert> {
        match &self.state {
            AlertState::PendingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    /// Evaluates one published detection set. `capture_still` is called only
    /// when the machine actually leaves `Idle`.
    pub fn on_detections(
        &mut self,
        detections: &[Detection],
        settings: &Settings,
        capture_still: impl FnOnce() -> Option<String>,
    ) -> Transition {
        if !settings.ai_active || !matches!(self.state, AlertState::Idle) {
            return Transition::Ignored;
        }
        if !qualifies(detections, settings.sensitivity) {
            return Transition::Ignored;
        }

        let confidence = aggregate(detections) * 100.0;
        self.raise(AlertTrigger::Detection, confidence, capture_still())
    }

    /// User-initiated escalation that skips the detection gate.
    pub fn escalate(
        &mut self,
        confidence: f32,
        capture_still: impl FnOnce() -> Option<String>,
    ) -> Transition {
        if !matches!(self.state, AlertState::Idle) {
            return Transition::Ignored;
        }
        self.raise(AlertTrigger::Manual, confidence, capture_still())
    }

    fn raise(
        &mut self,
        trigger: AlertTrigger,
        confidence: f32,
        snapshot: Option<String>,
    ) -> Transition {
        self.logger.record(&format!(
            "alert raised ({:?}, {:.1}%, snapshot {})",
            trigger,
            confidence,
            if snapshot.is_some() { "captured" } else { "missing" }
        ));
        self.state = AlertState::PendingConfirmation(PendingAlert {
            trigger,
            confidence,
            snapshot,
            raised_at: Utc::now(),
        });
        self.notifier.notify(&AlertCue::new(confidence));
        Transition::Raised
    }

    /// Builds the record for the pending alert without changing state, so the
    /// store call can run outside whatever lock guards the machine. `None`
    /// when nothing is pending.
    pub fn prepare_dispatch(
        &self,
        coordinates: Option<Coordinates>,
    ) -> Result<Option<Dispatch>, AlertError> {
        let Some(pending) = self.pending() else {
            return Ok(None);
        };
        let coordinates = coordinates.ok_or(AlertError::CoordinatesUnavailable)?;
        Ok(Some(Dispatch {
            alert: NewAlert {
                user_id: self.user_id,
                latitude: coordinates.latitude,
                longitude: coordinates.longitude,
                image_data: pending.snapshot.clone(),
                confidence: pending.confidence,
                status: AlertStatus::Sent,
                emergency_contact_id: self.contact_id,
            },
            raised_at: pending.raised_at,
        }))
    }

    /// Applies the store's answer for a dispatch started from the alert
    /// raised at `raised_at`. A failed write keeps the alert pending. A write
    /// that lands after that alert was cancelled leaves the state alone.
    pub fn finish_dispatch(
        &mut self,
        raised_at: DateTime<Utc>,
        result: StoreResult<AlertRecord>,
    ) -> Result<Transition, AlertError> {
        let record = result.map_err(|err| {
            self.logger
                .warn(&format!("dispatching alert failed: {}", err));
            AlertError::from(err)
        })?;

        match self.pending() {
            Some(pending) if pending.raised_at == raised_at => {
                self.logger
                    .record(&format!("alert {} dispatched", record.id));
                self.notifier.silence();
                self.state = AlertState::Sent(record);
                Ok(Transition::Dispatched)
            }
            _ => {
                self.logger.warn(&format!(
                    "alert {} stored after its confirmation was withdrawn",
                    record.id
                ));
                Ok(Transition::Ignored)
            }
        }
    }

    /// Persists the pending alert and moves to `Sent`. On failure the alert
    /// stays pending so the user can try again.
    pub async fn confirm<S: AlertStore>(
        &mut self,
        coordinates: Option<Coordinates>,
        store: &S,
    ) -> Result<Transition, AlertError> {
        let Some(dispatch) = self.prepare_dispatch(coordinates)? else {
            return Ok(Transition::Ignored);
        };
        let result = store.create_alert(dispatch.alert).await;
        self.finish_dispatch(dispatch.raised_at, result)
    }

    /// Drops the pending alert and its snapshot without persisting anything.
    pub fn cancel(&mut self) -> Transition {
        if !matches!(self.state, AlertState::PendingConfirmation(_)) {
            return Transition::Ignored;
        }
        self.logger.record("pending alert cancelled");
        self.notifier.silence();
        self.state = AlertState::Idle;
        Transition::Cancelled
    }

    pub fn acknowledge(&mut self) -> Transition {
        if !matches!(self.state, AlertState::Sent(_)) {
            return Transition::Ignored;
        }
        self.state = AlertState::Idle;
        Transition::Acknowledged
    }
}
