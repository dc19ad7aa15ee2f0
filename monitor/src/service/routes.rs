use crate::service::payload::{
    validate_alert, validate_contact, AlertSent, FieldError, InvalidBody, MessageBody,
    StatusChange, DEFAULT_USER_ID,
};
use anyhow::Context;
use fireguardcore::interface::{ContactUpdate, NewContact, SettingsUpdate};
use fireguardcore::store::RecordStore;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Alert bodies carry a JPEG data URL.
const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

fn respond<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn message(status: StatusCode, text: &str) -> Response {
    respond(status, &MessageBody::new(text))
}

fn invalid(text: &str, errors: Vec<FieldError>) -> Response {
    respond(
        StatusCode::BAD_REQUEST,
        &InvalidBody {
            message: text.to_string(),
            errors,
        },
    )
}

fn unparsable(err: serde_json::Error) -> Vec<FieldError> {
    vec![FieldError {
        path: Vec::new(),
        message: err.to_string(),
    }]
}

/// Every route of the alert service, without the socket.
pub fn routes<S: RecordStore>(
    store: Arc<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let store = warp::any().map(move || store.clone());

    let create_alert = warp::path!("alerts")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(store.clone())
        .and_then(create_alert::<S>);

    let list_alerts = warp::path!("alerts")
        .and(warp::get())
        .and(store.clone())
        .and_then(list_alerts::<S>);

    let alert_status = warp::path!("alerts" / i64 / "status")
        .and(warp::put())
        .and(warp::body::json())
        .and(store.clone())
        .and_then(update_alert_status::<S>);

    let list_contacts = warp::path!("emergency-contacts")
        .and(warp::get())
        .and(store.clone())
        .and_then(list_contacts::<S>);

    let create_contact = warp::path!("emergency-contacts")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(store.clone())
        .and_then(create_contact::<S>);

    let update_contact = warp::path!("emergency-contacts" / i64)
        .and(warp::put())
        .and(warp::body::json())
        .and(store.clone())
        .and_then(update_contact::<S>);

    let delete_contact = warp::path!("emergency-contacts" / i64)
        .and(warp::delete())
        .and(store.clone())
        .and_then(delete_contact::<S>);

    let get_settings = warp::path!("settings")
        .and(warp::get())
        .and(store.clone())
        .and_then(get_settings::<S>);

    let put_settings = warp::path!("settings")
        .and(warp::put())
        .and(warp::body::json())
        .and(store)
        .and_then(put_settings::<S>);

    create_alert
        .or(list_alerts)
        .or(alert_status)
        .or(list_contacts)
        .or(create_contact)
        .or(update_contact)
        .or(delete_contact)
        .or(get_settings)
        .or(put_settings)
        .recover(handle_rejection)
        .with(warp::log("monitor::service"))
}

async fn create_alert<S: RecordStore>(body: Bytes, store: Arc<S>) -> Result<Response, Infallible> {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => return Ok(invalid("Invalid alert data", unparsable(err))),
    };
    let alert = match validate_alert(&body) {
        Ok(alert) => alert,
        Err(err) => return Ok(invalid("Invalid alert data", err.0)),
    };

    match store.create_alert(alert).await {
        Ok(alert) => {
            info!("alert {} stored ({:.1}%)", alert.id, alert.confidence);
            Ok(respond(
                StatusCode::OK,
                &AlertSent {
                    message: "Alert sent successfully".into(),
                    alert,
                },
            ))
        }
        Err(err) => {
            error!("Error creating alert: {}", err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send alert",
            ))
        }
    }
}

async fn list_alerts<S: RecordStore>(store: Arc<S>) -> Result<Response, Infallible> {
    match store.alerts_by_user(DEFAULT_USER_ID).await {
        Ok(alerts) => Ok(respond(StatusCode::OK, &alerts)),
        Err(err) => {
            error!("Error fetching alerts: {}", err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch alerts",
            ))
        }
    }
}

async fn update_alert_status<S: RecordStore>(
    id: i64,
    change: StatusChange,
    store: Arc<S>,
) -> Result<Response, Infallible> {
    match store.update_alert_status(id, change.status).await {
        Ok(Some(alert)) => Ok(respond(StatusCode::OK, &alert)),
        Ok(None) => Ok(message(StatusCode::NOT_FOUND, "Alert not found")),
        Err(err) => {
            error!("Error updating alert {}: {}", id, err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update alert",
            ))
        }
    }
}

async fn list_contacts<S: RecordStore>(store: Arc<S>) -> Result<Response, Infallible> {
    match store.contacts(DEFAULT_USER_ID).await {
        Ok(contacts) => Ok(respond(StatusCode::OK, &contacts)),
        Err(err) => {
            error!("Error fetching emergency contacts: {}", err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch emergency contacts",
            ))
        }
    }
}

async fn create_contact<S: RecordStore>(
    body: Bytes,
    store: Arc<S>,
) -> Result<Response, Infallible> {
    let contact: NewContact = match serde_json::from_slice(&body) {
        Ok(contact) => contact,
        Err(err) => return Ok(invalid("Invalid contact data", unparsable(err))),
    };
    let contact = match validate_contact(contact) {
        Ok(contact) => contact,
        Err(err) => return Ok(invalid("Invalid contact data", err.0)),
    };

    match store.create_contact(contact).await {
        Ok(contact) => Ok(respond(StatusCode::CREATED, &contact)),
        Err(err) => {
            error!("Error creating emergency contact: {}", err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create emergency contact",
            ))
        }
    }
}

async fn update_contact<S: RecordStore>(
    id: i64,
    update: ContactUpdate,
    store: Arc<S>,
) -> Result<Response, Infallible> {
    match store.update_contact(id, update).await {
        Ok(Some(contact)) => Ok(respond(StatusCode::OK, &contact)),
        Ok(None) => Ok(message(StatusCode::NOT_FOUND, "Emergency contact not found")),
        Err(err) => {
            error!("Error updating emergency contact {}: {}", id, err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update emergency contact",
            ))
        }
    }
}

async fn delete_contact<S: RecordStore>(id: i64, store: Arc<S>) -> Result<Response, Infallible> {
    match store.delete_contact(id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(false) => Ok(message(StatusCode::NOT_FOUND, "Emergency contact not found")),
        Err(err) => {
            error!("Error deleting emergency contact {}: {}", id, err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete emergency contact",
            ))
        }
    }
}

async fn get_settings<S: RecordStore>(store: Arc<S>) -> Result<Response, Infallible> {
    match store.settings(DEFAULT_USER_ID).await {
        Ok(settings) => Ok(respond(StatusCode::OK, &settings)),
        Err(err) => {
            error!("Error fetching settings: {}", err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch settings",
            ))
        }
    }
}

async fn put_settings<S: RecordStore>(
    mut update: SettingsUpdate,
    store: Arc<S>,
) -> Result<Response, Infallible> {
    update.user_id = Some(DEFAULT_USER_ID);
    match store.update_settings(update).await {
        Ok(Some(settings)) => Ok(respond(StatusCode::OK, &settings)),
        Ok(None) => Ok(message(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update settings",
        )),
        Err(err) => {
            error!("Error updating settings: {}", err);
            Ok(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update settings",
            ))
        }
    }
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if rejection.is_not_found() {
        return Ok(message(StatusCode::NOT_FOUND, "Not found"));
    }
    if let Some(err) = rejection.find::<BodyDeserializeError>() {
        return Ok(invalid(
            "Invalid request body",
            vec![FieldError {
                path: Vec::new(),
                message: err.to_string(),
            }],
        ));
    }
    if rejection.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(message(StatusCode::LENGTH_REQUIRED, "Content-Length required"));
    }
    if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(message(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large"));
    }
    if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(message(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }
    error!("unhandled rejection: {:?}", rejection);
    Ok(message(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
    ))
}

/// Hosts the service until Ctrl+C.
pub async fn serve<S: RecordStore>(bind: SocketAddr, store: Arc<S>) -> anyhow::Result<()> {
    let (addr, server) = warp::serve(routes(store))
        .try_bind_with_graceful_shutdown(bind, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("awaiting Ctrl+C failed: {}", err);
            }
        })
        .with_context(|| format!("binding alert service to {}", bind))?;
    info!("alert service listening on http://{}", addr);
    server.await;
    info!("alert service stopped");
    Ok(())
}
