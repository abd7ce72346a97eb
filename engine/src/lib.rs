//! # TCI Live Engine
//!
//! Keeps a client-side, sorted collection in sync with a remote resource
//! that publishes insert/update/delete notifications.
//!
//! The dashboard renders company score cards and claims that are computed
//! upstream. This crate holds the logic that decides what the dashboard
//! shows at any moment: an initial snapshot, then every change event applied
//! in delivery order, with the view re-sorted after each one.
//!
//! ## Design Principles
//!
//! - **No IO**: fetching and subscribing happen outside; the engine only
//!   sees their results
//! - **Deterministic**: the same snapshot and event sequence always produce
//!   the same view, independent of timing
//! - **Upsert-safe**: duplicated or reordered insert/update delivery never
//!   creates duplicates or drops data
//!
//! ## Core Concepts
//!
//! ### Records and change events
//!
//! A [`Record`] is a keyed row. A [`ChangeEvent`] is an insert, update or
//! delete for one key; [`ChangePayload`] is its wire form.
//!
//! ### Collection view
//!
//! [`CollectionView`] holds records unique by key, ordered by a [`SortSpec`].
//! Ties keep first-seen order.
//!
//! ### Reconciler
//!
//! [`Reconciler`] owns a view plus its lifecycle status
//! (`loading` / `ready` / `error`). Events that arrive before the snapshot
//! are buffered, stale fetch results are discarded by [`FetchTicket`], and
//! observers are told about every visible change.
//!
//! ## Quick Start
//!
//! ```rust
//! use tci_live_engine::{ChangeEvent, Record, Reconciler, ResourceQuery, SortSpec};
//! use serde_json::json;
//!
//! let query = ResourceQuery::new("companies", SortSpec::descending("score"));
//! let mut reconciler = Reconciler::new(query);
//!
//! // 1. Start the snapshot fetch
//! let ticket = reconciler.begin_fetch();
//!
//! // 2. Events that race the fetch are held back
//! reconciler.apply(ChangeEvent::insert(Record::new("C", json!({"score": 10}))));
//!
//! // 3. Snapshot lands
//! reconciler.complete_fetch(ticket, Ok(vec![
//!     Record::new("A", json!({"score": 50})),
//!     Record::new("B", json!({"score": 80})),
//! ]));
//! assert_eq!(reconciler.view().keys(), vec!["B", "A", "C"]);
//!
//! // 4. Live updates re-sort the view
//! reconciler.apply(ChangeEvent::update(Record::new("A", json!({"score": 90}))));
//! assert_eq!(reconciler.view().keys(), vec!["A", "B", "C"]);
//! ```

pub mod error;
pub mod event;
pub mod model;
pub mod observer;
pub mod order;
pub mod reconcile;
pub mod record;
pub mod replay;
pub mod resource;
pub mod state;
pub mod view;

// Re-export main types at crate root
pub use error::Error;
pub use event::{ChangeEvent, ChangeKind, ChangePayload};
pub use model::{Claim, ClaimStatus, ClaimTally, Company};
pub use observer::{Callback, ObserverId, Observers};
pub use order::{Direction, SortSpec};
pub use reconcile::{ApplyOutcome, FetchOutcome, FetchTicket, Reconciler};
pub use record::Record;
pub use replay::Replay;
pub use resource::{Filter, ResourceQuery, CLAIMS, COMPANIES};
pub use state::{Status, ViewState};
pub use view::{Change, CollectionView};

/// Type aliases for clarity
pub type RecordKey = String;
pub type ResourceName = String;
pub type Revision = u64;
pub type Generation = u64;
