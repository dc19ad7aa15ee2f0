use crate::policy::SensitivityLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Pending,
    Sent,
    Canceled,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Sent => "sent",
            AlertStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(AlertStatus::Pending),
            "sent" => Ok(AlertStatus::Sent),
            "canceled" => Ok(AlertStatus::Canceled),
            other => Err(format!("unknown alert status '{}'", other)),
        }
    }
}

/// Persisted emergency report. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub status: AlertStatus,
    #[serde(default)]
    pub emergency_contact_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub image_data: Option<String>,
    pub confidence: f32,
    pub status: AlertStatus,
    pub emergency_contact_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub id: i64,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    pub is_default: bool,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub user_id: i64,
}

/// Partial contact update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub id: i64,
    pub user_id: i64,
    pub sensitivity: SensitivityLevel,
    pub notifications_enabled: bool,
    pub location_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSettings {
    pub user_id: i64,
    #[serde(default)]
    pub sensitivity: SensitivityLevel,
    #[serde(default = "enabled")]
    pub notifications_enabled: bool,
    #[serde(default = "enabled")]
    pub location_enabled: bool,
}

/// Upsert keyed by `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub user_id: Option<i64>,
    pub sensitivity: Option<SensitivityLevel>,
    pub notifications_enabled: Option<bool>,
    pub location_enabled: Option<bool>,
}

fn enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_status_uses_lowercase_wire_names() {
        let json = serde_json::to_string(&AlertStatus::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
        assert_eq!("sent".parse::<AlertStatus>(), Ok(AlertStatus::Sent));
    }

    #[test]
    fn new_settings_fill_defaults_from_partial_json() {
        let settings: NewSettings = serde_json::from_str(r#"{"userId": 4}"#).unwrap();
        assert_eq!(settings.sensitivity, SensitivityLevel::Medium);
        assert!(settings.notifications_enabled);
        assert!(settings.location_enabled);
    }
}
