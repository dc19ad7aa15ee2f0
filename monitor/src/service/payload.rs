//! Wire shapes of the alert service and their validation.

use fireguardcore::interface::{AlertRecord, AlertStatus, NewAlert, NewContact};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User every request is attributed to; the service has no authentication.
pub const DEFAULT_USER_ID: i64 = 1;

/// Body of `POST /alerts`. Numbers travel as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub latitude: String,
    pub longitude: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub confidence: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl AlertPayload {
    pub fn from_new_alert(alert: &NewAlert) -> Self {
        Self {
            latitude: alert.latitude.to_string(),
            longitude: alert.longitude.to_string(),
            image_data: alert.image_data.clone(),
            confidence: format!("{:.1}", alert.confidence),
            status: Some(alert.status.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub path: Vec<String>,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            path: vec![field.to_string()],
            message: message.into(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("invalid payload: {} field error(s)", .0.len())]
pub struct ValidationError(pub Vec<FieldError>);

fn required_string(body: &Value, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match body.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, "Required"));
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            errors.push(FieldError::new(field, "Expected string"));
            None
        }
    }
}

fn optional_string(body: &Value, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match body.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            errors.push(FieldError::new(field, "Expected string"));
            None
        }
    }
}

fn parse_ranged(
    raw: Option<String>,
    field: &str,
    min: f64,
    max: f64,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && (min..=max).contains(&value) => Some(value),
        Ok(_) => {
            errors.push(FieldError::new(
                field,
                format!("must be between {} and {}", min, max),
            ));
            None
        }
        Err(_) => {
            errors.push(FieldError::new(field, "must be a decimal number"));
            None
        }
    }
}

/// Validates a raw `POST /alerts` body. Either every field is valid and a
/// complete alert comes back, or nothing does.
pub fn validate_alert(body: &Value) -> Result<NewAlert, ValidationError> {
    if !body.is_object() {
        return Err(ValidationError(vec![FieldError {
            path: Vec::new(),
            message: "Expected object".into(),
        }]));
    }

    let mut errors = Vec::new();
    let latitude = required_string(body, "latitude", &mut errors);
    let longitude = required_string(body, "longitude", &mut errors);
    let confidence = required_string(body, "confidence", &mut errors);
    let image_data = optional_string(body, "imageData", &mut errors);
    let status = optional_string(body, "status", &mut errors);

    let latitude = parse_ranged(latitude, "latitude", -90.0, 90.0, &mut errors);
    let longitude = parse_ranged(longitude, "longitude", -180.0, 180.0, &mut errors);
    let confidence = parse_ranged(confidence, "confidence", 0.0, 100.0, &mut errors);

    if let Some(image) = &image_data {
        if !image.starts_with("data:image/") {
            errors.push(FieldError::new("imageData", "must be an image data URL"));
        }
    }

    let status = match status {
        None => Some(AlertStatus::default()),
        Some(raw) => match raw.parse::<AlertStatus>() {
            Ok(status) => Some(status),
            Err(message) => {
                errors.push(FieldError::new("status", message));
                None
            }
        },
    };

    match (latitude, longitude, confidence, status) {
        (Some(latitude), Some(longitude), Some(confidence), Some(status)) if errors.is_empty() => {
            Ok(NewAlert {
                user_id: DEFAULT_USER_ID,
                latitude,
                longitude,
                image_data,
                confidence: confidence as f32,
                status,
                emergency_contact_id: None,
            })
        }
        _ => Err(ValidationError(errors)),
    }
}

/// Rejects contacts without a name or phone number and pins the owner.
pub fn validate_contact(mut contact: NewContact) -> Result<NewContact, ValidationError> {
    let mut errors = Vec::new();
    if contact.name.trim().is_empty() {
        errors.push(FieldError::new("name", "must not be empty"));
    }
    if contact.phone.trim().is_empty() {
        errors.push(FieldError::new("phone", "must not be empty"));
    }
    if !errors.is_empty() {
        return Err(ValidationError(errors));
    }
    contact.user_id = DEFAULT_USER_ID;
    Ok(contact)
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvalidBody {
    pub message: String,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertSent {
    pub message: String,
    pub alert: AlertRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: AlertStatus,
}
