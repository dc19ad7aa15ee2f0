use crate::service::payload::{AlertPayload, AlertSent, StatusChange};
use anyhow::Context;
use fireguardcore::interface::{AlertRecord, AlertStatus, NewAlert};
use fireguardcore::store::{AlertStore, StoreError, StoreResult};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct RejectedBody {
    #[serde(default)]
    errors: Vec<RejectedField>,
}

#[derive(Deserialize)]
struct RejectedField {
    #[serde(default)]
    path: Vec<String>,
    message: String,
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Alert store backed by a running alert service.
#[derive(Clone)]
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl AlertStore for ServiceClient {
    async fn create_alert(&self, alert: NewAlert) -> StoreResult<AlertRecord> {
        let response = self
            .http
            .post(self.url("/alerts"))
            .json(&AlertPayload::from_new_alert(&alert))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::OK => {
                let sent: AlertSent = response.json().await.map_err(transport)?;
                Ok(sent.alert)
            }
            StatusCode::BAD_REQUEST => {
                let rejected: RejectedBody = response.json().await.map_err(transport)?;
                Err(StoreError::Validation(
                    rejected
                        .errors
                        .into_iter()
                        .map(|field| format!("{}: {}", field.path.join("."), field.message))
                        .collect(),
                ))
            }
            status => Err(StoreError::Backend(format!(
                "alert service answered {}",
                status
            ))),
        }
    }

    async fn alerts_by_user(&self, user_id: i64) -> StoreResult<Vec<AlertRecord>> {
        let response = self
            .http
            .get(self.url("/alerts"))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let alerts: Vec<AlertRecord> = response.json().await.map_err(transport)?;
        Ok(alerts
            .into_iter()
            .filter(|alert| alert.user_id == user_id)
            .collect())
    }

    async fn update_alert_status(
        &self,
        id: i64,
        status: AlertStatus,
    ) -> StoreResult<Option<AlertRecord>> {
        let response = self
            .http
            .put(self.url(&format!("/alerts/{}/status", id)))
            .json(&StatusChange { status })
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(transport)?;
        let alert: AlertRecord = response.json().await.map_err(transport)?;
        Ok(Some(alert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::routes;
    use fireguardcore::store::MemoryStore;
    use std::sync::Arc;

    fn spawn_service() -> (ServiceClient, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::seeded());
        let (addr, server) = warp::serve(routes(store.clone())).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        let client = ServiceClient::new(format!("http://{}/", addr)).unwrap();
        (client, store)
    }

    fn alert(latitude: f64) -> NewAlert {
        NewAlert {
            user_id: 1,
            latitude,
            longitude: -74.006,
            image_data: Some("data:image/jpeg;base64,AAAA".into()),
            confidence: 62.0,
            status: AlertStatus::Sent,
            emergency_contact_id: None,
        }
    }

    #[tokio::test]
    async fn alerts_dispatch_over_the_wire() {
        let (client, store) = spawn_service();

        let created = client.create_alert(alert(40.7128)).await.unwrap();
        assert_eq!(created.status, AlertStatus::Sent);
        assert_eq!(created.latitude, 40.7128);
        assert_eq!(store.alerts_by_user(1).await.unwrap().len(), 1);

        let listed = client.alerts_by_user(1).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert!(client.alerts_by_user(2).await.unwrap().is_empty());

        let canceled = client
            .update_alert_status(created.id, AlertStatus::Canceled)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(canceled.status, AlertStatus::Canceled);
        assert!(client
            .update_alert_status(999, AlertStatus::Sent)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rejected_alert_surfaces_field_errors() {
        let (client, store) = spawn_service();
        let err = client.create_alert(alert(123.0)).await.unwrap_err();
        match err {
            StoreError::Validation(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].starts_with("latitude:"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(store.alerts_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_is_a_backend_error() {
        let client = ServiceClient::new("http://127.0.0.1:1").unwrap();
        let err = client.create_alert(alert(1.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
