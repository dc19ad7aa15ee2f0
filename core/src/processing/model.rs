use crate::telemetry::LogManager;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Load status of the shared detection model.
pub enum ModelStatus<M> {
    Loading,
    Ready(Arc<M>),
    Failed(String),
}

impl<M> Clone for ModelStatus<M> {
    fn clone(&self) -> Self {
        match self {
            ModelStatus::Loading => ModelStatus::Loading,
            ModelStatus::Ready(model) => ModelStatus::Ready(Arc::clone(model)),
            ModelStatus::Failed(reason) => ModelStatus::Failed(reason.clone()),
        }
    }
}

/// Serializable summary of [`ModelStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Loading,
    Ready,
    Unavailable,
}

/// Write side of the model slot. Consumed by the single load attempt.
pub struct ModelLoader<M> {
    status: watch::Sender<ModelStatus<M>>,
    logger: LogManager,
}

/// Read-only handle shared by every consumer of the model.
pub struct ModelHandle<M> {
    status: watch::Receiver<ModelStatus<M>>,
}

impl<M> Clone for ModelHandle<M> {
    fn clone(&self) -> Self {
        Self {
            status: self.status.clone(),
        }
    }
}

/// Creates an empty model slot in the `Loading` state.
pub fn model_slot<M>() -> (ModelLoader<M>, ModelHandle<M>) {
    let (tx, rx) = watch::channel(ModelStatus::Loading);
    (
        ModelLoader {
            status: tx,
            logger: LogManager::new("model"),
        },
        ModelHandle { status: rx },
    )
}

impl<M> ModelLoader<M> {
    pub fn complete(self, result: Result<M, String>) {
        match result {
            Ok(model) => {
                self.logger.record("model loaded");
                self.status.send_replace(ModelStatus::Ready(Arc::new(model)));
            }
            Err(reason) => {
                self.logger
                    .error(&format!("model failed to load, AI unavailable: {}", reason));
                self.status.send_replace(ModelStatus::Failed(reason));
            }
        }
    }
}

impl<M> ModelHandle<M> {
    /// Handle around an already loaded model.
    pub fn ready(model: M) -> Self {
        let (loader, handle) = model_slot();
        loader.status.send_replace(ModelStatus::Ready(Arc::new(model)));
        handle
    }

    pub fn current(&self) -> Option<Arc<M>> {
        match &*self.status.borrow() {
            ModelStatus::Ready(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn state(&self) -> ModelState {
        match &*self.status.borrow() {
            ModelStatus::Loading => ModelState::Loading,
            ModelStatus::Ready(_) => ModelState::Ready,
            ModelStatus::Failed(_) => ModelState::Unavailable,
        }
    }

    /// Waits until loading settles. `None` when the load failed or the loader
    /// was dropped without completing.
    pub async fn wait_loaded(&mut self) -> Option<Arc<M>> {
        let settled = self
            .status
            .wait_for(|status| !matches!(status, ModelStatus::Loading))
            .await
            .ok()?
            .clone();
        match settled {
            ModelStatus::Ready(model) => Some(model),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_loaded_resolves_once_loader_completes() {
        let (loader, mut handle) = model_slot::<u32>();
        assert_eq!(handle.state(), ModelState::Loading);
        assert!(handle.current().is_none());

        let waiter = tokio::spawn(async move { handle.wait_loaded().await });
        loader.complete(Ok(7));

        let model = waiter.await.unwrap();
        assert_eq!(model.as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn failed_load_reports_unavailable() {
        let (loader, mut handle) = model_slot::<u32>();
        loader.complete(Err("weights missing".into()));
        assert!(handle.wait_loaded().await.is_none());
        assert_eq!(handle.state(), ModelState::Unavailable);
    }

    #[tokio::test]
    async fn dropped_loader_never_yields_a_model() {
        let (loader, mut handle) = model_slot::<u32>();
        drop(loader);
        assert!(handle.wait_loaded().await.is_none());
    }
}
