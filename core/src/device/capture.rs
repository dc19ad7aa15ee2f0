use crate::interface::{CapabilityError, CapabilityProvider, FrameSource, ReadyState, VideoDevice};
use crate::prelude::Frame;
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which enumerated camera to open when the session starts.
///
/// Enumeration order is device dependent; `Last` tends to be the rear camera
/// on phones but nothing guarantees it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelection {
    First,
    #[default]
    Last,
    ById(String),
}

impl DeviceSelection {
    pub fn pick<'a>(&self, devices: &'a [VideoDevice]) -> Option<&'a VideoDevice> {
        match self {
            DeviceSelection::First => devices.first(),
            DeviceSelection::Last => devices.last(),
            DeviceSelection::ById(id) => devices
                .iter()
                .find(|device| &device.id == id)
                .or_else(|| devices.last()),
        }
    }
}

/// Owns the open camera stream. At most one source is live at a time and the
/// previous one is always stopped before the next is opened.
pub struct CaptureSession<P: CapabilityProvider> {
    provider: Arc<P>,
    selection: DeviceSelection,
    devices: Vec<VideoDevice>,
    device_id: Option<String>,
    source: Option<Arc<P::Source>>,
    torch: bool,
    logger: LogManager,
}

impl<P: CapabilityProvider> CaptureSession<P> {
    pub fn new(provider: Arc<P>, selection: DeviceSelection) -> Self {
        Self {
            provider,
            selection,
            devices: Vec::new(),
            device_id: None,
            source: None,
            torch: false,
            logger: LogManager::new("capture"),
        }
    }

    /// Enumerates cameras and opens the one picked by the selection policy.
    pub async fn start(&mut self) -> Result<(), CapabilityError> {
        self.devices = self.provider.list_devices()?;
        let target = self.selection.pick(&self.devices).map(|d| d.id.clone());
        self.open(target).await
    }

    /// Replaces the live stream with one from `device_id`.
    pub async fn switch_to(&mut self, device_id: &str) -> Result<(), CapabilityError> {
        self.open(Some(device_id.to_string())).await
    }

    /// Cycles to the next enumerated camera. No-op with fewer than two.
    pub async fn flip(&mut self) -> Result<(), CapabilityError> {
        if self.devices.len() <= 1 {
            return Ok(());
        }
        let current = self
            .device_id
            .as_ref()
            .and_then(|id| self.devices.iter().position(|d| &d.id == id));
        let next = current.map_or(0, |index| (index + 1) % self.devices.len());
        let target = self.devices[next].id.clone();
        self.switch_to(&target).await
    }

    async fn open(&mut self, device_id: Option<String>) -> Result<(), CapabilityError> {
        self.release();
        self.device_id = None;
        let source = match self.provider.open(device_id.as_deref()).await {
            Ok(source) => source,
            Err(err) => {
                self.logger
                    .warn(&format!("camera unavailable, capture degraded: {}", err));
                self.torch = false;
                return Err(err);
            }
        };
        self.logger.record(&format!(
            "opened camera {}",
            device_id.as_deref().unwrap_or("<default>")
        ));
        self.source = Some(Arc::new(source));
        self.device_id = device_id;

        if self.torch {
            self.apply_torch(true);
        }
        Ok(())
    }

    /// Flips the torch and returns the resulting state. Unsupported or failing
    /// torches leave it off.
    pub fn toggle_torch(&mut self) -> bool {
        let requested = !self.torch;
        self.apply_torch(requested);
        self.torch
    }

    fn apply_torch(&mut self, enabled: bool) {
        let Some(source) = self.source.as_ref() else {
            self.torch = false;
            return;
        };
        match source.set_torch(enabled) {
            Ok(()) => self.torch = enabled,
            Err(CapabilityError::Unsupported) => {
                self.logger.trace("torch not supported on this device");
                self.torch = false;
            }
            Err(err) => {
                self.logger.warn(&format!("toggling torch failed: {}", err));
                self.torch = false;
            }
        }
    }

    pub fn source(&self) -> Option<Arc<P::Source>> {
        self.source.clone()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.source
            .as_ref()
            .map_or(ReadyState::NotReady, |source| source.ready_state())
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.source.as_ref().and_then(|source| source.current_frame())
    }

    pub fn capture_still(&self) -> Option<String> {
        self.source.as_ref().and_then(|source| source.capture_still())
    }

    pub fn devices(&self) -> &[VideoDevice] {
        &self.devices
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn torch_enabled(&self) -> bool {
        self.torch
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Stops the live tracks. Safe to call repeatedly; tracks stop once.
    pub fn release(&mut self) {
        if let Some(source) = self.source.take() {
            source.stop_tracks();
            self.logger.trace("camera tracks stopped");
        }
    }
}

impl<P: CapabilityProvider> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    fn cameras() -> Vec<VideoDevice> {
        vec![
            VideoDevice::new("front", "Front camera"),
            VideoDevice::new("back", "Back camera"),
        ]
    }

    #[test]
    fn selection_policies_pick_expected_device() {
        let devices = cameras();
        assert_eq!(DeviceSelection::First.pick(&devices).unwrap().id, "front");
        assert_eq!(DeviceSelection::Last.pick(&devices).unwrap().id, "back");
        assert_eq!(
            DeviceSelection::ById("front".into()).pick(&devices).unwrap().id,
            "front"
        );
        assert_eq!(
            DeviceSelection::ById("missing".into()).pick(&devices).unwrap().id,
            "back"
        );
        assert!(DeviceSelection::First.pick(&[]).is_none());
    }

    #[tokio::test]
    async fn start_opens_last_enumerated_camera_by_default() {
        let provider = Arc::new(MockProvider::with_devices(cameras()));
        let mut capture = CaptureSession::new(provider.clone(), DeviceSelection::default());
        capture.start().await.unwrap();
        assert_eq!(capture.device_id(), Some("back"));
        assert_eq!(capture.ready_state(), ReadyState::ReadyForCapture);
    }

    #[tokio::test]
    async fn switching_stops_old_tracks_before_opening_new_device() {
        let provider = Arc::new(MockProvider::with_devices(cameras()));
        let mut capture = CaptureSession::new(provider.clone(), DeviceSelection::First);
        capture.start().await.unwrap();
        capture.flip().await.unwrap();

        assert_eq!(capture.device_id(), Some("back"));
        assert_eq!(
            provider.events(),
            vec!["open:front", "stop:front", "open:back"]
        );
    }

    #[tokio::test]
    async fn flip_with_single_camera_is_a_no_op() {
        let provider = Arc::new(MockProvider::with_devices(vec![VideoDevice::new(
            "only", "Only",
        )]));
        let mut capture = CaptureSession::new(provider.clone(), DeviceSelection::Last);
        capture.start().await.unwrap();
        capture.flip().await.unwrap();
        assert_eq!(provider.events(), vec!["open:only"]);
    }

    #[tokio::test]
    async fn unsupported_torch_stays_off() {
        let provider = Arc::new(MockProvider::with_devices(cameras()).without_torch());
        let mut capture = CaptureSession::new(provider, DeviceSelection::Last);
        capture.start().await.unwrap();
        assert!(!capture.toggle_torch());
        assert!(!capture.torch_enabled());
    }

    #[tokio::test]
    async fn supported_torch_toggles_on_and_off() {
        let provider = Arc::new(MockProvider::with_devices(cameras()));
        let mut capture = CaptureSession::new(provider, DeviceSelection::Last);
        capture.start().await.unwrap();
        assert!(capture.toggle_torch());
        assert!(!capture.toggle_torch());
    }

    #[tokio::test]
    async fn failed_switch_leaves_no_live_device() {
        let provider = Arc::new(MockProvider::with_devices(cameras()));
        let mut capture = CaptureSession::new(provider.clone(), DeviceSelection::First);
        capture.start().await.unwrap();
        assert!(capture.toggle_torch());

        provider.fail_open(Some(CapabilityError::PermissionDenied));
        assert_eq!(capture.flip().await, Err(CapabilityError::PermissionDenied));
        assert!(!capture.is_open());
        assert_eq!(capture.device_id(), None);
        assert!(!capture.torch_enabled());
        assert_eq!(capture.ready_state(), ReadyState::NotReady);
        assert_eq!(provider.events(), vec!["open:front", "stop:front"]);

        provider.fail_open(None);
        capture.switch_to("back").await.unwrap();
        assert_eq!(capture.device_id(), Some("back"));
    }

    #[tokio::test]
    async fn release_stops_tracks_exactly_once() {
        let provider = Arc::new(MockProvider::with_devices(cameras()));
        let mut capture = CaptureSession::new(provider.clone(), DeviceSelection::Last);
        capture.start().await.unwrap();
        capture.release();
        capture.release();
        drop(capture);
        assert_eq!(provider.stop_count(), 1);
    }
}
