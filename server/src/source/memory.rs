//! In-memory data service.
//!
//! Holds tables in process and fans mutations out to subscribers as change
//! payloads, exactly as the database trigger would. Also lets a caller bend
//! delivery: hold snapshot responses, fail the next fetch or subscribe,
//! inject raw payloads, and cut every subscription.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::json;
use tci_live_engine::{ChangeEvent, ChangeKind, ChangePayload, Error, Record, ResourceQuery};
use tokio::sync::watch;

use super::{route, ChangeStream, DataService};

type EventSender = mpsc::UnboundedSender<Result<ChangeEvent, Error>>;

struct Subscriber {
    query: ResourceQuery,
    sender: EventSender,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Record>>,
    subscribers: Vec<Subscriber>,
    fail_next_fetch: Option<String>,
    fail_next_subscribe: Option<String>,
    fetch_count: usize,
}

/// Data service backed by in-process tables.
pub struct MemoryDataService {
    inner: Mutex<Inner>,
    /// `true` while snapshot responses may be returned
    gate: watch::Sender<bool>,
}

impl Default for MemoryDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDataService {
    /// Create an empty service.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Mutex::new(Inner::default()),
            gate,
        }
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace a table's rows without emitting changes.
    pub fn seed(&self, resource: &str, records: Vec<Record>) {
        self.state().tables.insert(resource.to_string(), records);
    }

    /// Insert a row, or replace it if the key exists, and notify.
    pub fn insert(&self, resource: &str, record: Record) {
        self.write(resource, record, ChangeKind::Insert);
    }

    /// Replace a row, or insert it if the key is new, and notify.
    pub fn update(&self, resource: &str, record: Record) {
        self.write(resource, record, ChangeKind::Update);
    }

    fn write(&self, resource: &str, record: Record, kind: ChangeKind) {
        let mut state = self.state();
        let table = state.tables.entry(resource.to_string()).or_default();
        let old = match table.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => Some(std::mem::replace(existing, record.clone()).to_row()),
            None => {
                table.push(record.clone());
                None
            }
        };
        let payload = ChangePayload {
            table: Some(resource.to_string()),
            event_type: kind,
            new: Some(record.to_row()),
            old,
        };
        Self::dispatch(&mut state, payload);
    }

    /// Remove a row and notify. Returns false if the key was absent; the
    /// delete is still delivered.
    pub fn delete(&self, resource: &str, key: &str) -> bool {
        let mut state = self.state();
        let removed = state.tables.get_mut(resource).and_then(|table| {
            let idx = table.iter().position(|r| r.id == key)?;
            Some(table.remove(idx))
        });
        let found = removed.is_some();
        let old = removed.map_or_else(|| json!({ "id": key }), |r| r.to_row());
        let payload = ChangePayload {
            table: Some(resource.to_string()),
            event_type: ChangeKind::Delete,
            new: None,
            old: Some(old),
        };
        Self::dispatch(&mut state, payload);
        found
    }

    /// Deliver a raw payload to subscribers without touching any table.
    pub fn push(&self, payload: ChangePayload) {
        Self::dispatch(&mut self.state(), payload);
    }

    fn dispatch(state: &mut Inner, payload: ChangePayload) {
        state.subscribers.retain(|subscriber| {
            match route(&subscriber.query, payload.clone()) {
                Some(event) => subscriber.sender.unbounded_send(Ok(event)).is_ok(),
                None => !subscriber.sender.is_closed(),
            }
        });
    }

    /// Current rows of a table, in insertion order.
    pub fn rows(&self, resource: &str) -> Vec<Record> {
        self.state().tables.get(resource).cloned().unwrap_or_default()
    }

    /// Make the next fetch fail with `message`.
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        self.state().fail_next_fetch = Some(message.into());
    }

    /// Make the next subscribe fail with `message`.
    pub fn fail_next_subscribe(&self, message: impl Into<String>) {
        self.state().fail_next_subscribe = Some(message.into());
    }

    /// Hold snapshot responses until [`release_fetches`](Self::release_fetches).
    ///
    /// The snapshot is still taken when the fetch starts, so changes made
    /// while it is held only reach the caller through the change stream.
    pub fn hold_fetches(&self) {
        self.gate.send_replace(false);
    }

    /// Let held snapshot responses through.
    pub fn release_fetches(&self) {
        self.gate.send_replace(true);
    }

    /// End every open change stream.
    pub fn drop_subscriptions(&self) {
        self.state().subscribers.clear();
    }

    /// Fail every open change stream with `message`, then end it.
    pub fn fail_subscriptions(&self, message: &str) {
        for subscriber in self.state().subscribers.drain(..) {
            let _ = subscriber
                .sender
                .unbounded_send(Err(Error::Subscription(message.to_string())));
        }
    }

    /// Number of change streams that are still being consumed.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|s| !s.sender.is_closed());
        state.subscribers.len()
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.state().fetch_count
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn fetch(&self, query: &ResourceQuery) -> Result<Vec<Record>, Error> {
        query.validate()?;

        let snapshot = {
            let mut state = self.state();
            state.fetch_count += 1;
            if let Some(message) = state.fail_next_fetch.take() {
                return Err(Error::Fetch(message));
            }
            let mut rows: Vec<Record> = state
                .tables
                .get(&query.resource)
                .map(|table| table.iter().filter(|r| query.admits(r)).cloned().collect())
                .unwrap_or_default();
            rows.sort_by(|a, b| query.order.compare(a, b));
            rows
        };

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        Ok(snapshot)
    }

    async fn subscribe(&self, query: &ResourceQuery) -> Result<ChangeStream, Error> {
        query.validate()?;

        let mut state = self.state();
        if let Some(message) = state.fail_next_subscribe.take() {
            return Err(Error::Subscription(message));
        }
        let (sender, receiver) = mpsc::unbounded();
        state.subscribers.push(Subscriber {
            query: query.clone(),
            sender,
        });
        Ok(receiver.boxed())
    }
}

impl std::fmt::Debug for MemoryDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryDataService")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}
