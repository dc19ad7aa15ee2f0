use crate::interface::{
    AlertRecord, AlertStatus, ContactUpdate, EmergencyContact, NewAlert, NewContact, NewSettings,
    SettingsRecord, SettingsUpdate,
};
use crate::store::{AlertStore, ContactStore, SettingsStore, StoreError, StoreResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Non-durable record store backing the alert service.
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    alerts: BTreeMap<i64, AlertRecord>,
    contacts: BTreeMap<i64, EmergencyContact>,
    settings: BTreeMap<i64, SettingsRecord>,
    next_alert: i64,
    next_contact: i64,
    next_settings: i64,
}

impl Tables {
    fn allocate(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn clear_default_except(&mut self, user_id: i64, keep: i64) {
        for contact in self.contacts.values_mut() {
            if contact.user_id == user_id && contact.id != keep {
                contact.is_default = false;
            }
        }
    }

    fn insert_settings(&mut self, settings: NewSettings) -> SettingsRecord {
        let id = Self::allocate(&mut self.next_settings);
        let record = SettingsRecord {
            id,
            user_id: settings.user_id,
            sensitivity: settings.sensitivity,
            notifications_enabled: settings.notifications_enabled,
            location_enabled: settings.location_enabled,
        };
        self.settings.insert(id, record.clone());
        record
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
        }
    }

    /// Store pre-populated with the demo user's default contact and settings.
    pub fn seeded() -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.inner.lock() {
            let contact_id = Tables::allocate(&mut tables.next_contact);
            tables.contacts.insert(
                contact_id,
                EmergencyContact {
                    id: contact_id,
                    name: "Local Fire Department".into(),
                    phone: "911".into(),
                    address: Some("123 Emergency St".into()),
                    is_default: true,
                    user_id: 1,
                },
            );
            tables.insert_settings(NewSettings {
                user_id: 1,
                sensitivity: Default::default(),
                notifications_enabled: true,
                location_enabled: true,
            });
        }
        store
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("record store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore for MemoryStore {
    async fn create_alert(&self, alert: NewAlert) -> StoreResult<AlertRecord> {
        let mut tables = self.tables()?;
        let id = Tables::allocate(&mut tables.next_alert);
        let record = AlertRecord {
            id,
            user_id: alert.user_id,
            latitude: alert.latitude,
            longitude: alert.longitude,
            image_data: alert.image_data,
            confidence: alert.confidence,
            timestamp: Utc::now(),
            status: alert.status,
            emergency_contact_id: alert.emergency_contact_id,
        };
        tables.alerts.insert(id, record.clone());
        Ok(record)
    }

    async fn alerts_by_user(&self, user_id: i64) -> StoreResult<Vec<AlertRecord>> {
        let tables = self.tables()?;
        let mut alerts: Vec<AlertRecord> = tables
            .alerts
            .values()
            .filter(|alert| alert.user_id == user_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }

    async fn update_alert_status(
        &self,
        id: i64,
        status: AlertStatus,
    ) -> StoreResult<Option<AlertRecord>> {
        let mut tables = self.tables()?;
        Ok(tables.alerts.get_mut(&id).map(|alert| {
            alert.status = status;
            alert.clone()
        }))
    }
}

impl ContactStore for MemoryStore {
    async fn create_contact(&self, contact: NewContact) -> StoreResult<EmergencyContact> {
        let mut tables = self.tables()?;
        let id = Tables::allocate(&mut tables.next_contact);
        let record = EmergencyContact {
            id,
            name: contact.name,
            phone: contact.phone,
            address: contact.address,
            is_default: contact.is_default,
            user_id: contact.user_id,
        };
        if record.is_default {
            tables.clear_default_except(record.user_id, id);
        }
        tables.contacts.insert(id, record.clone());
        Ok(record)
    }

    async fn contacts(&self, user_id: i64) -> StoreResult<Vec<EmergencyContact>> {
        let tables = self.tables()?;
        Ok(tables
            .contacts
            .values()
            .filter(|contact| contact.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn contact(&self, id: i64) -> StoreResult<Option<EmergencyContact>> {
        let tables = self.tables()?;
        Ok(tables.contacts.get(&id).cloned())
    }

    async fn update_contact(
        &self,
        id: i64,
        update: ContactUpdate,
    ) -> StoreResult<Option<EmergencyContact>> {
        let mut tables = self.tables()?;
        let Some(contact) = tables.contacts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            contact.name = name;
        }
        if let Some(phone) = update.phone {
            contact.phone = phone;
        }
        if let Some(address) = update.address {
            contact.address = Some(address);
        }
        if let Some(is_default) = update.is_default {
            contact.is_default = is_default;
        }
        let updated = contact.clone();
        if update.is_default == Some(true) {
            tables.clear_default_except(updated.user_id, id);
        }
        Ok(Some(updated))
    }

    async fn delete_contact(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        Ok(tables.contacts.remove(&id).is_some())
    }
}

impl SettingsStore for MemoryStore {
    async fn settings(&self, user_id: i64) -> StoreResult<Option<SettingsRecord>> {
        let tables = self.tables()?;
        Ok(tables
            .settings
            .values()
            .find(|settings| settings.user_id == user_id)
            .cloned())
    }

    async fn create_settings(&self, settings: NewSettings) -> StoreResult<SettingsRecord> {
        let mut tables = self.tables()?;
        Ok(tables.insert_settings(settings))
    }

    async fn update_settings(&self, update: SettingsUpdate) -> StoreResult<Option<SettingsRecord>> {
        let Some(user_id) = update.user_id else {
            return Ok(None);
        };
        let mut tables = self.tables()?;
        let existing = tables
            .settings
            .values_mut()
            .find(|settings| settings.user_id == user_id);

        match existing {
            Some(record) => {
                if let Some(sensitivity) = update.sensitivity {
                    record.sensitivity = sensitivity;
                }
                if let Some(enabled) = update.notifications_enabled {
                    record.notifications_enabled = enabled;
                }
                if let Some(enabled) = update.location_enabled {
                    record.location_enabled = enabled;
                }
                Ok(Some(record.clone()))
            }
            None => Ok(Some(tables.insert_settings(NewSettings {
                user_id,
                sensitivity: update.sensitivity.unwrap_or_default(),
                notifications_enabled: update.notifications_enabled.unwrap_or(true),
                location_enabled: update.location_enabled.unwrap_or(true),
            }))),
        }
    }
}
