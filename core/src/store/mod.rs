//! Persistence contract for alerts, emergency contacts and settings.

pub mod memory;

pub use memory::MemoryStore;

use crate::interface::{
    AlertRecord, AlertStatus, ContactUpdate, EmergencyContact, NewAlert, NewContact, NewSettings,
    SettingsRecord, SettingsUpdate,
};
use std::future::Future;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("invalid record: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait AlertStore: Send + Sync + 'static {
    fn create_alert(&self, alert: NewAlert) -> impl Future<Output = StoreResult<AlertRecord>> + Send;

    /// Alerts for `user_id`, newest first.
    fn alerts_by_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = StoreResult<Vec<AlertRecord>>> + Send;

    fn update_alert_status(
        &self,
        id: i64,
        status: AlertStatus,
    ) -> impl Future<Output = StoreResult<Option<AlertRecord>>> + Send;
}

/// At most one contact per user carries `is_default`.
pub trait ContactStore: Send + Sync + 'static {
    fn create_contact(
        &self,
        contact: NewContact,
    ) -> impl Future<Output = StoreResult<EmergencyContact>> + Send;

    fn contacts(&self, user_id: i64)
        -> impl Future<Output = StoreResult<Vec<EmergencyContact>>> + Send;

    fn contact(&self, id: i64) -> impl Future<Output = StoreResult<Option<EmergencyContact>>> + Send;

    fn update_contact(
        &self,
        id: i64,
        update: ContactUpdate,
    ) -> impl Future<Output = StoreResult<Option<EmergencyContact>>> + Send;

    fn delete_contact(&self, id: i64) -> impl Future<Output = StoreResult<bool>> + Send;
}

pub trait SettingsStore: Send + Sync + 'static {
    fn settings(&self, user_id: i64)
        -> impl Future<Output = StoreResult<Option<SettingsRecord>>> + Send;

    fn create_settings(
        &self,
        settings: NewSettings,
    ) -> impl Future<Output = StoreResult<SettingsRecord>> + Send;

    /// Upserts by `update.user_id`; `None` when no user id was given.
    fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> impl Future<Output = StoreResult<Option<SettingsRecord>>> + Send;
}

pub trait RecordStore: AlertStore + ContactStore + SettingsStore {}

impl<T: AlertStore + ContactStore + SettingsStore> RecordStore for T {}
