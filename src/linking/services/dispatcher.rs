//! Worker pool feeding events into the agent service.
//!
//! Persistence changes go through a single consumer so that changes to one
//! entity are reconciled in commit order. Value events are spread over a
//! fixed pool of workers sharing one receiver; they never wait behind a slow
//! link because actuator writes skip the link operation lock.

use super::agent::AgentService;
use crate::linking::{
    domain::{AssetChangeEvent, AttributeValueEvent, ProcessingStatus},
    ports::{AssetPipeline, AssetStore},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Worker and queue sizing for [`EventDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Number of tasks consuming value events.
    pub value_workers: usize,
    /// Capacity of each bounded queue.
    pub queue_capacity: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            value_workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Errors returned when enqueueing events.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher has been shut down.
    #[error("event dispatcher is shut down")]
    Closed,
}

/// Owns the event queues and the tasks draining them.
pub struct EventDispatcher {
    change_tx: mpsc::Sender<AssetChangeEvent>,
    value_tx: mpsc::Sender<AttributeValueEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl EventDispatcher {
    /// Spawns the change consumer and the value workers on the current
    /// runtime.
    #[must_use]
    pub fn spawn<S, P>(service: Arc<AgentService<S, P>>, settings: DispatchSettings) -> Self
    where
        S: AssetStore + 'static,
        P: AssetPipeline + 'static,
    {
        let capacity = settings.queue_capacity.max(1);
        let (change_tx, mut change_rx) = mpsc::channel::<AssetChangeEvent>(capacity);
        let (value_tx, value_rx) = mpsc::channel::<AttributeValueEvent>(capacity);
        let shared_value_rx = Arc::new(Mutex::new(value_rx));
        let value_workers = settings.value_workers.max(1);

        let mut workers = Vec::with_capacity(value_workers + 1);
        for worker in 0..value_workers {
            let value_service = Arc::clone(&service);
            let receiver = Arc::clone(&shared_value_rx);
            workers.push(tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(event) = next else {
                        break;
                    };
                    let state = value_service.route_attribute_event(event).await;
                    if state.status() == ProcessingStatus::Error {
                        tracing::warn!(
                            attribute_ref = %state.event().attribute_ref(),
                            error = state.error().unwrap_or_default(),
                            "attribute event failed"
                        );
                    }
                }
                tracing::debug!(worker, "value worker stopped");
            }));
        }

        workers.push(tokio::spawn(async move {
            while let Some(event) = change_rx.recv().await {
                let report = service.handle_change_event(&event).await;
                if report.failures > 0 {
                    tracing::warn!(
                        asset_id = %event.asset().id(),
                        failures = report.failures,
                        "reconciliation completed with contained failures"
                    );
                }
            }
            tracing::debug!("change consumer stopped");
        }));

        tracing::info!(value_workers, capacity, "event dispatcher started");
        Self {
            change_tx,
            value_tx,
            workers,
        }
    }

    /// Enqueues a persistence change, waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the consumers have stopped.
    pub async fn submit_change(&self, event: AssetChangeEvent) -> Result<(), DispatchError> {
        self.change_tx
            .send(event)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    /// Enqueues an attribute value event, waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the workers have stopped.
    pub async fn submit_value(&self, event: AttributeValueEvent) -> Result<(), DispatchError> {
        self.value_tx
            .send(event)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    /// Closes both queues and waits for every queued event to be handled.
    pub async fn shutdown(self) {
        let Self {
            change_tx,
            value_tx,
            workers,
        } = self;
        drop(change_tx);
        drop(value_tx);
        for handle in workers {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "event worker terminated abnormally");
            }
        }
        tracing::info!("event dispatcher stopped");
    }
}
