pub mod capability;
pub mod records;

pub use capability::{
    CapabilityError, CapabilityProvider, Coordinates, FrameSource, ReadyState, VideoDevice,
};
pub use records::{
    AlertRecord, AlertStatus, ContactUpdate, EmergencyContact, NewAlert, NewContact, NewSettings,
    SettingsRecord, SettingsUpdate,
};
