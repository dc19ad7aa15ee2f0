pub mod capture;
pub mod location;

pub use capture::{CaptureSession, DeviceSelection};
pub use location::LocationTracker;
