//! Reconciler - keeps a local collection view consistent with a remote
//! resource.
//!
//! # Lifecycle
//!
//! 1. `new` starts in `loading` with an empty view
//! 2. `begin_fetch` hands out a ticket for the snapshot round trip
//! 3. Change events arriving while `loading` are buffered
//! 4. `complete_fetch` loads the snapshot, replays the buffer in delivery
//!    order, and moves to `ready` (or to `error` on failure)
//! 5. In `ready`, every event is applied immediately and the view re-sorted
//! 6. `dispose` tears everything down; late results are discarded
//!
//! The reconciler does no IO. Whoever drives it performs the fetch between
//! `begin_fetch` and `complete_fetch`, and feeds change events through
//! `apply` strictly in delivery order.

use crate::{
    observer::{Callback, ObserverId, Observers},
    view::{Change, CollectionView},
    ChangeEvent, Error, Generation, Record, ResourceQuery, Revision, Status, ViewState,
};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Proof that a snapshot fetch was started by a specific reconciler.
///
/// A ticket is only honoured once, and only if no later fetch, failure or
/// disposal happened on the same reconciler in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    instance: u64,
    generation: Generation,
}

impl FetchTicket {
    /// Generation this ticket was issued for.
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Result of completing a snapshot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Snapshot loaded; `replayed` buffered events were applied on top
    Applied { replayed: usize },
    /// Fetch failed; the reconciler is now in `error`
    Failed,
    /// Ticket was stale; nothing changed
    Discarded,
}

/// Result of applying a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied to the view
    Applied(Change),
    /// Held until the snapshot lands
    Buffered,
    /// Dropped (reconciler failed or disposed)
    Ignored,
}

/// Client-side view of one remote resource.
pub struct Reconciler {
    instance: u64,
    query: ResourceQuery,
    view: CollectionView,
    status: Status,
    /// Events received while loading, in delivery order
    pending: Vec<ChangeEvent>,
    generation: Generation,
    /// Generation of the fetch currently awaited
    awaiting: Option<Generation>,
    disposed: bool,
    revision: Revision,
    observers: Observers,
}

impl Reconciler {
    /// Create a reconciler for a query. Starts `loading` with an empty view.
    pub fn new(query: ResourceQuery) -> Self {
        let view = CollectionView::new(query.order.clone());
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            query,
            view,
            status: Status::Loading,
            pending: Vec::new(),
            generation: 0,
            awaiting: None,
            disposed: false,
            revision: 0,
            observers: Observers::new(),
        }
    }

    /// Start a snapshot fetch.
    ///
    /// Any earlier ticket becomes stale. Events buffered for an earlier
    /// fetch are dropped: the new snapshot is taken after them.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket {
            instance: self.instance,
            generation: self.generation,
        };
        if self.disposed {
            return ticket;
        }
        self.awaiting = Some(self.generation);
        self.pending.clear();
        if !self.status.is_loading() {
            self.status = Status::Loading;
            self.publish();
        }
        ticket
    }

    /// Complete a snapshot fetch started with `begin_fetch`.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Record>, Error>,
    ) -> FetchOutcome {
        if self.disposed
            || ticket.instance != self.instance
            || self.awaiting != Some(ticket.generation)
        {
            return FetchOutcome::Discarded;
        }
        self.awaiting = None;

        match result {
            Ok(records) => {
                self.view.load(records);
                let buffered = std::mem::take(&mut self.pending);
                let replayed = buffered.len();
                for event in buffered {
                    self.view.apply(event);
                }
                self.status = Status::Ready;
                self.publish();
                FetchOutcome::Applied { replayed }
            }
            Err(err) => {
                self.view.clear();
                self.pending.clear();
                self.status = Status::Error(err.message());
                self.publish();
                FetchOutcome::Failed
            }
        }
    }

    /// Apply a change event in delivery order.
    pub fn apply(&mut self, event: ChangeEvent) -> ApplyOutcome {
        if self.disposed {
            return ApplyOutcome::Ignored;
        }
        match self.status {
            Status::Loading => {
                self.pending.push(event);
                ApplyOutcome::Buffered
            }
            Status::Ready => {
                let change = self.view.apply(event);
                if change.is_change() {
                    self.publish();
                }
                ApplyOutcome::Applied(change)
            }
            Status::Error(_) => ApplyOutcome::Ignored,
        }
    }

    /// Put the reconciler into `error` without a fetch failing, e.g. when
    /// the change stream is lost for good.
    ///
    /// The last known items stay visible; buffered events and any in-flight
    /// fetch are dropped.
    pub fn fail(&mut self, error: Error) {
        if self.disposed {
            return;
        }
        self.awaiting = None;
        self.pending.clear();
        self.status = Status::Error(error.message());
        self.publish();
    }

    /// Tear down. Idempotent.
    ///
    /// Clears the view and buffer, invalidates outstanding tickets, and
    /// unregisters every observer.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.awaiting = None;
        self.pending.clear();
        self.view.clear();
        self.observers.clear();
    }

    /// Register a callback invoked after every visible change.
    pub fn observe(&mut self, callback: Callback) -> ObserverId {
        self.observers.add(callback)
    }

    /// Unregister a callback.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    fn publish(&mut self) {
        self.revision += 1;
        if !self.observers.is_empty() {
            let state = self.state();
            self.observers.notify(&state);
        }
    }

    /// Get the query this reconciler follows.
    pub fn query(&self) -> &ResourceQuery {
        &self.query
    }

    /// Get the current status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Get the current view.
    pub fn view(&self) -> &CollectionView {
        &self.view
    }

    /// Clone the current items in view order.
    pub fn items(&self) -> Vec<Record> {
        self.view.items()
    }

    /// Revision counter, bumped on every visible change.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Number of events waiting for the snapshot.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Check if `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Snapshot of everything the presentation layer renders.
    pub fn state(&self) -> ViewState {
        ViewState {
            resource: self.query.resource.clone(),
            filter: self.query.filter.clone(),
            status: self.status.clone(),
            items: self.view.items(),
            revision: self.revision,
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("query", &self.query)
            .field("status", &self.status)
            .field("len", &self.view.len())
            .field("pending", &self.pending.len())
            .field("revision", &self.revision)
            .field("disposed", &self.disposed)
            .finish()
    }
}
