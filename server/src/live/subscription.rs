//! Subscription lifecycle.
//!
//! Owns at most one open change stream at a time. Each stream is drained by
//! a forwarding task that tags every item with the id of the subscription it
//! came from, so whoever consumes the signals can tell current events from
//! stragglers of a subscription that was already replaced.

use std::sync::Arc;

use futures::StreamExt;
use tci_live_engine::{ChangeEvent, Error, ResourceQuery};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::source::DataService;

/// Identifies one opened subscription.
pub type SubscriptionId = Uuid;

/// What a forwarding task reports.
#[derive(Debug)]
pub enum Signal {
    /// A change event arrived
    Event {
        id: SubscriptionId,
        event: ChangeEvent,
    },
    /// The stream failed or ended
    Lost { id: SubscriptionId, error: Error },
}

impl Signal {
    /// Subscription the signal belongs to.
    pub fn id(&self) -> SubscriptionId {
        match self {
            Signal::Event { id, .. } | Signal::Lost { id, .. } => *id,
        }
    }
}

/// Sender half that forwarding tasks report into.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

struct Handle {
    id: SubscriptionId,
    scope: String,
    task: JoinHandle<()>,
}

/// Opens and closes subscriptions on a data service, one at a time.
pub struct SubscriptionManager {
    source: Arc<dyn DataService>,
    current: Option<Handle>,
}

impl SubscriptionManager {
    /// Create a manager with nothing open.
    pub fn new(source: Arc<dyn DataService>) -> Self {
        Self {
            source,
            current: None,
        }
    }

    /// Open a subscription for `query`, closing the current one first.
    ///
    /// # Errors
    ///
    /// Returns the data service's error if the channel cannot be opened. The
    /// previous subscription stays closed in that case.
    pub async fn open(
        &mut self,
        query: &ResourceQuery,
        sink: SignalSender,
    ) -> Result<SubscriptionId, Error> {
        self.shutdown().await;

        let mut stream = self.source.subscribe(query).await?;
        let id = Uuid::new_v4();
        let scope = query.channel_name();

        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => {
                        if sink.send(Signal::Event { id, event }).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = sink.send(Signal::Lost { id, error });
                        return;
                    }
                }
            }
            let _ = sink.send(Signal::Lost {
                id,
                error: Error::Subscription("change stream closed".to_string()),
            });
        });

        tracing::info!(subscription_id = %id, scope = %scope, "Subscription opened");
        self.current = Some(Handle { id, scope, task });
        Ok(id)
    }

    /// Close the current subscription. Returns false if none was open.
    ///
    /// The forwarding task is aborted; its stream, and with it the remote
    /// channel, is dropped once the runtime reaps the task.
    pub fn close(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                handle.task.abort();
                tracing::info!(
                    subscription_id = %handle.id,
                    scope = %handle.scope,
                    "Subscription closed"
                );
                true
            }
            None => false,
        }
    }

    /// Close the current subscription and wait until its stream is dropped.
    pub async fn shutdown(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                handle.task.abort();
                let _ = handle.task.await;
                tracing::info!(
                    subscription_id = %handle.id,
                    scope = %handle.scope,
                    "Subscription closed"
                );
                true
            }
            None => false,
        }
    }

    /// Id of the open subscription, if any.
    pub fn current(&self) -> Option<SubscriptionId> {
        self.current.as_ref().map(|h| h.id)
    }

    /// Check if a subscription is open.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("current", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryDataService;
    use serde_json::json;
    use tci_live_engine::Record;

    fn manager() -> (Arc<MemoryDataService>, SubscriptionManager) {
        let source = Arc::new(MemoryDataService::new());
        let manager = SubscriptionManager::new(source.clone());
        (source, manager)
    }

    #[tokio::test]
    async fn forwards_tagged_events() {
        let (source, mut manager) = manager();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = manager.open(&ResourceQuery::companies(), tx).await.unwrap();
        assert_eq!(manager.current(), Some(id));

        source.insert("companies", Record::new("A", json!({"tci_score": 1})));
        match rx.recv().await.unwrap() {
            Signal::Event { id: got, event } => {
                assert_eq!(got, id);
                assert_eq!(event.key(), "A");
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn reopen_closes_previous() {
        let (source, mut manager) = manager();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.open(&ResourceQuery::claims_for("A"), tx.clone()).await.unwrap();
        let second = manager.open(&ResourceQuery::claims_for("B"), tx).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(source.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (source, mut manager) = manager();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.open(&ResourceQuery::companies(), tx).await.unwrap();

        assert!(manager.shutdown().await);
        assert!(!manager.shutdown().await);
        assert!(!manager.close());
        assert!(!manager.is_open());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn stream_end_is_reported_as_lost() {
        let (source, mut manager) = manager();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.open(&ResourceQuery::companies(), tx).await.unwrap();

        source.drop_subscriptions();
        match rx.recv().await.unwrap() {
            Signal::Lost { id: got, error } => {
                assert_eq!(got, id);
                assert!(matches!(error, Error::Subscription(_)));
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn open_failure_propagates() {
        let (source, mut manager) = manager();
        let (tx, _rx) = mpsc::unbounded_channel();
        source.fail_next_subscribe("refused");

        let err = manager.open(&ResourceQuery::companies(), tx).await.unwrap_err();
        assert_eq!(err, Error::Subscription("refused".to_string()));
        assert!(!manager.is_open());
    }
}
