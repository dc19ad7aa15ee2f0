use crate::prelude::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Readiness of a live video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    NotReady,
    ReadyForCapture,
}

/// Device capabilities are optional; every call reports `Unsupported`
/// explicitly instead of being probed at the call site.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capability not supported on this device")]
    Unsupported,
    #[error("permission denied")]
    PermissionDenied,
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for capability")]
    Timeout,
}

/// Best-effort position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDevice {
    pub id: String,
    pub label: String,
}

impl VideoDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Live video track opened on one device.
pub trait FrameSource: Send + Sync + 'static {
    fn ready_state(&self) -> ReadyState;

    /// Latest decoded frame, if the track has one.
    fn current_frame(&self) -> Option<Frame>;

    /// Current frame encoded as an image data URL.
    fn capture_still(&self) -> Option<String>;

    fn set_torch(&self, enabled: bool) -> Result<(), CapabilityError>;

    /// Stops every track of the stream. Called once per opened source.
    fn stop_tracks(&self);
}

/// Device sensors and media exposed to the monitoring session.
pub trait CapabilityProvider: Send + Sync + 'static {
    type Source: FrameSource;

    fn list_devices(&self) -> Result<Vec<VideoDevice>, CapabilityError>;

    fn open(
        &self,
        device_id: Option<&str>,
    ) -> impl Future<Output = Result<Self::Source, CapabilityError>> + Send;

    fn coordinates(&self) -> impl Future<Output = Result<Coordinates, CapabilityError>> + Send;

    /// Battery charge in percent.
    fn battery_level(&self) -> Result<f32, CapabilityError>;

    fn request_wake_lock(&self) -> Result<(), CapabilityError>;
}
