//! PostgreSQL data service.
//!
//! Snapshots are plain `SELECT`s over the upstream tables. Changes arrive as
//! `NOTIFY` payloads emitted by the `tci_notify_change` row trigger and are
//! received through a dedicated [`PgListener`] connection per subscription.

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tci_live_engine::{ChangePayload, Error, Record, ResourceQuery};

use super::{route, ChangeStream, DataService};

/// Data service backed by a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PgDataService {
    pool: PgPool,
    channel: String,
}

impl PgDataService {
    /// Create a data service listening on `channel` for change payloads.
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

/// Build the snapshot query. Identifiers must already be validated.
fn snapshot_sql(query: &ResourceQuery) -> String {
    let filter = match &query.filter {
        Some(filter) => format!(" WHERE t.{}::text = $1", filter.field),
        None => String::new(),
    };
    format!(
        "SELECT to_jsonb(t) FROM {} t{} ORDER BY t.{} {} NULLS LAST",
        query.resource,
        filter,
        query.order.field,
        query.order.direction.as_sql()
    )
}

#[async_trait]
impl DataService for PgDataService {
    async fn fetch(&self, query: &ResourceQuery) -> Result<Vec<Record>, Error> {
        query.validate()?;
        let sql = snapshot_sql(query);

        let mut select = sqlx::query_scalar::<_, serde_json::Value>(&sql);
        if let Some(filter) = &query.filter {
            select = select.bind(&filter.value);
        }
        let rows = select
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        tracing::debug!(
            resource = %query.resource,
            rows = rows.len(),
            "Fetched snapshot"
        );

        rows.into_iter().map(Record::from_row).collect()
    }

    async fn subscribe(&self, query: &ResourceQuery) -> Result<ChangeStream, Error> {
        query.validate()?;

        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| Error::Subscription(e.to_string()))?;
        listener
            .listen(&self.channel)
            .await
            .map_err(|e| Error::Subscription(e.to_string()))?;

        tracing::debug!(
            channel = %self.channel,
            scope = %query.channel_name(),
            "Listening for changes"
        );

        // `into_stream` ends when the connection drops, which the driver
        // treats as a lost subscription.
        let query = query.clone();
        let stream = listener.into_stream().filter_map(move |item| {
            let event = match item {
                Ok(notification) => match ChangePayload::parse(notification.payload()) {
                    Ok(payload) => route(&query, payload).map(Ok),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed notification");
                        None
                    }
                },
                Err(e) => Some(Err(Error::Subscription(e.to_string()))),
            };
            futures::future::ready(event)
        });

        Ok(stream.boxed())
    }
}
