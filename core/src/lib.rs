//! Core of the fire-detection monitor.
//!
//! Frames come from a [`interface::CapabilityProvider`], are scored by a
//! [`prelude::DetectionModel`] inside the [`processing::DetectionLoop`], and
//! qualifying detections drive the [`alert::AlertStateMachine`] until the user
//! confirms, cancels or acknowledges. [`session::MonitoringSession`] wires the
//! pieces together for one run.

pub mod alert;
pub mod device;
pub mod interface;
pub mod policy;
pub mod prelude;
pub mod processing;
pub mod session;
pub mod settings;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use prelude::{BoundingBox, Detection, DetectionModel, Frame, RawCandidate, ScoreError};
pub use session::{MonitoringSession, SessionConfig, SessionStatus};
