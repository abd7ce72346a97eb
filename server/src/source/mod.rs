//! Remote data service adapters.
//!
//! A data service answers snapshot queries and streams row changes. The
//! live driver only talks to it through [`DataService`], so the PostgreSQL
//! adapter and the in-memory one are interchangeable.

mod memory;
mod postgres;

pub use memory::MemoryDataService;
pub use postgres::PgDataService;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use tci_live_engine::{ChangeEvent, ChangePayload, Error, Filter, Record, ResourceQuery};

/// Stream of change events for one subscription.
///
/// Dropping the stream unsubscribes. An `Err` item or the end of the stream
/// means the subscription is lost.
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent, Error>>;

/// A source of snapshots and change notifications.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Fetch every row in scope for `query`, already in view order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Fetch` if the round trip fails, or
    /// `Error::InvalidIdentifier` if the query cannot be expressed safely.
    async fn fetch(&self, query: &ResourceQuery) -> Result<Vec<Record>, Error>;

    /// Subscribe to changes in scope for `query`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Subscription` if the channel cannot be opened.
    async fn subscribe(&self, query: &ResourceQuery) -> Result<ChangeStream, Error>;
}

/// Turn a raw notification into an event for `query`.
///
/// Payloads for another table or outside the query's filter yield `None`.
/// An update that moves a row out of the filter (its old row matched, its
/// new row does not) becomes a delete. Undecodable payloads are logged and
/// skipped.
pub(crate) fn route(query: &ResourceQuery, payload: ChangePayload) -> Option<ChangeEvent> {
    if !payload.is_for(&query.resource) {
        return None;
    }
    let decoded = match &query.filter {
        Some(filter) if !in_scope(filter, payload.row()) => {
            let updated = payload.new.as_ref().is_some_and(|row| !row.is_null());
            if updated && in_scope(filter, payload.old.as_ref()) {
                departure(payload)
            } else {
                return None;
            }
        }
        _ => ChangeEvent::try_from(payload),
    };
    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(
                resource = %query.resource,
                error = %e,
                "Skipping undecodable change payload"
            );
            None
        }
    }
}

fn in_scope(filter: &Filter, row: Option<&Value>) -> bool {
    row.is_some_and(|row| filter.matches_row(row))
}

/// Delete for a row that left the filtered scope.
fn departure(payload: ChangePayload) -> Result<ChangeEvent, Error> {
    let row = payload
        .old
        .ok_or_else(|| Error::InvalidPayload("payload without old row".to_string()))?;
    Ok(ChangeEvent::delete(Record::from_row(row)?.id))
}
