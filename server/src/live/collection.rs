//! Live collection driver.
//!
//! A [`LiveCollection`] runs one reconciler inside one tokio task. The task
//! performs the IO the reconciler leaves out (snapshot fetches and the change
//! subscription) and feeds results back strictly in arrival order, so the
//! reconciler never sees two things at once.
//!
//! # Startup
//!
//! 1. `begin_fetch` puts the reconciler in `loading`
//! 2. The subscription is opened, so every later change gets buffered
//! 3. The snapshot fetch starts, bounded by the fetch timeout
//!
//! Changes that overlap with the snapshot are absorbed by upsert semantics.
//!
//! # Subscription loss
//!
//! The first loss puts the reconciler back in `loading` (keeping its items)
//! and schedules one resubscription after a short delay, followed by a fresh
//! snapshot. A second loss before a snapshot lands moves the reconciler to
//! `error`. A loss while already in `error` waits for `retry`.

use std::sync::Arc;
use std::time::Duration;

use tci_live_engine::{
    Error, FetchOutcome, FetchTicket, Record, Reconciler, ResourceQuery, Status, ViewState,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::subscription::{Signal, SignalSender, SubscriptionId, SubscriptionManager};
use crate::source::DataService;

/// Timing knobs for a live collection.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Upper bound for one snapshot fetch
    pub fetch_timeout: Duration,
    /// Wait before the single resubscription attempt
    pub resubscribe_delay: Duration,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            resubscribe_delay: Duration::from_millis(500),
        }
    }
}

enum Command {
    Rescope(ResourceQuery),
    Retry,
    Dispose(oneshot::Sender<()>),
}

/// Handle to a running live collection.
///
/// Dropping the handle disposes the collection.
#[derive(Debug)]
pub struct LiveCollection {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ViewState>,
}

impl LiveCollection {
    /// Start following `query`. Must be called within a tokio runtime.
    pub fn spawn(source: Arc<dyn DataService>, query: ResourceQuery, options: LiveOptions) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        let (publisher, state) = watch::channel(ViewState::loading(&query));
        let publisher = Arc::new(publisher);
        let (signals, signal_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            subscription: SubscriptionManager::new(Arc::clone(&source)),
            reconciler: attach(query, &publisher),
            source,
            options,
            publisher,
            signals,
            active: None,
            fetches: JoinSet::new(),
            resubscribed: false,
            resubscribe_at: None,
        };
        tokio::spawn(driver.run(inbox, signal_rx));

        Self { commands, state }
    }

    /// Receiver that is updated after every visible change.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    /// Latest published state.
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Latest published status.
    pub fn status(&self) -> Status {
        self.state.borrow().status.clone()
    }

    /// Wait until the collection is no longer loading.
    ///
    /// Returns `None` if the collection was disposed first.
    pub async fn settled(&self) -> Option<ViewState> {
        let mut state = self.state.clone();
        let settled = state.wait_for(|s| !s.status.is_loading()).await.ok()?;
        Some(settled.clone())
    }

    /// Follow a different query. The old reconciler is disposed and its
    /// subscription closed before the new one opens.
    pub fn rescope(&self, query: ResourceQuery) {
        let _ = self.commands.send(Command::Rescope(query));
    }

    /// Start over after an error. Does nothing in any other state.
    pub fn retry(&self) {
        let _ = self.commands.send(Command::Retry);
    }

    /// Tear down and wait until the subscription is closed. Idempotent.
    pub async fn dispose(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(Command::Dispose(done)).is_ok() {
            let _ = finished.await;
        }
    }

    /// Check if the driver task is gone.
    pub fn is_disposed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Create a reconciler whose every visible change is published.
fn attach(query: ResourceQuery, publisher: &Arc<watch::Sender<ViewState>>) -> Reconciler {
    let mut reconciler = Reconciler::new(query);
    let sink = Arc::clone(publisher);
    reconciler.observe(Box::new(move |state: &ViewState| {
        sink.send_replace(state.clone());
    }));
    publisher.send_replace(reconciler.state());
    reconciler
}

type Fetched = (FetchTicket, Result<Vec<Record>, Error>);

struct Driver {
    source: Arc<dyn DataService>,
    options: LiveOptions,
    reconciler: Reconciler,
    subscription: SubscriptionManager,
    publisher: Arc<watch::Sender<ViewState>>,
    signals: SignalSender,
    /// Subscription whose signals are current
    active: Option<SubscriptionId>,
    fetches: JoinSet<Fetched>,
    /// Whether the single resubscription was already spent
    resubscribed: bool,
    resubscribe_at: Option<Instant>,
}

impl Driver {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        self.load().await;

        loop {
            let deadline = self.resubscribe_at;
            tokio::select! {
                command = inbox.recv() => match command {
                    Some(Command::Rescope(query)) => self.rescope(query).await,
                    Some(Command::Retry) => self.retry().await,
                    Some(Command::Dispose(done)) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        self.shutdown().await;
                        return;
                    }
                },
                Some(signal) = signals.recv() => self.on_signal(signal),
                Some(joined) = self.fetches.join_next() => match joined {
                    Ok((ticket, result)) => self.on_fetched(ticket, result),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::error!(error = %e, "Snapshot fetch task failed"),
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.resubscribe_at = None;
                    tracing::info!(scope = %self.scope(), "Resubscribing");
                    self.load().await;
                }
            }
        }
    }

    fn scope(&self) -> String {
        self.reconciler.query().channel_name()
    }

    /// Begin a snapshot, open the subscription, then start the fetch.
    async fn load(&mut self) {
        let ticket = self.reconciler.begin_fetch();
        let query = self.reconciler.query().clone();
        match self.subscription.open(&query, self.signals.clone()).await {
            Ok(id) => {
                self.active = Some(id);
                self.spawn_fetch(ticket);
            }
            Err(error) => {
                self.active = None;
                self.on_lost(error);
            }
        }
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        let source = Arc::clone(&self.source);
        let query = self.reconciler.query().clone();
        let timeout = self.options.fetch_timeout;
        self.fetches.spawn(async move {
            let result = match tokio::time::timeout(timeout, source.fetch(&query)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Fetch(format!(
                    "snapshot fetch timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            (ticket, result)
        });
    }

    fn on_fetched(&mut self, ticket: FetchTicket, result: Result<Vec<Record>, Error>) {
        match self.reconciler.complete_fetch(ticket, result) {
            FetchOutcome::Applied { replayed } => {
                if self.active.is_some() {
                    self.resubscribed = false;
                }
                tracing::info!(
                    scope = %self.scope(),
                    items = self.reconciler.view().len(),
                    replayed,
                    "Snapshot applied"
                );
            }
            FetchOutcome::Failed => {
                tracing::warn!(
                    scope = %self.scope(),
                    status = ?self.reconciler.status(),
                    "Snapshot fetch failed"
                );
            }
            FetchOutcome::Discarded => {
                tracing::debug!(
                    generation = ticket.generation(),
                    "Discarding stale snapshot"
                );
            }
        }
    }

    fn on_signal(&mut self, signal: Signal) {
        if self.active != Some(signal.id()) {
            tracing::debug!(subscription_id = %signal.id(), "Ignoring signal from closed subscription");
            return;
        }
        match signal {
            Signal::Event { event, .. } => {
                self.reconciler.apply(event);
            }
            Signal::Lost { error, .. } => {
                self.active = None;
                self.subscription.close();
                self.on_lost(error);
            }
        }
    }

    fn on_lost(&mut self, error: Error) {
        if matches!(self.reconciler.status(), Status::Error(_)) {
            // Recovery from an error is left to `retry`
            tracing::warn!(scope = %self.scope(), error = %error, "Subscription lost while in error");
            return;
        }
        if self.resubscribed {
            tracing::warn!(scope = %self.scope(), error = %error, "Subscription lost again");
            self.reconciler.fail(error);
            return;
        }
        tracing::warn!(scope = %self.scope(), error = %error, "Subscription lost");
        self.resubscribed = true;
        // Back to `loading` until the resubscription's snapshot lands; the
        // last items stay visible.
        self.reconciler.begin_fetch();
        self.resubscribe_at = Some(Instant::now() + self.options.resubscribe_delay);
    }

    async fn retry(&mut self) {
        if !matches!(self.reconciler.status(), Status::Error(_)) {
            return;
        }
        tracing::info!(scope = %self.scope(), "Retrying");
        self.resubscribed = false;
        self.resubscribe_at = None;
        match self.active {
            Some(_) => {
                let ticket = self.reconciler.begin_fetch();
                self.spawn_fetch(ticket);
            }
            None => self.load().await,
        }
    }

    async fn rescope(&mut self, query: ResourceQuery) {
        if &query == self.reconciler.query() {
            return;
        }
        tracing::info!(from = %self.scope(), to = %query.channel_name(), "Rescoping");
        self.teardown().await;
        self.resubscribed = false;
        self.reconciler = attach(query, &self.publisher);
        self.load().await;
    }

    async fn teardown(&mut self) {
        self.subscription.shutdown().await;
        self.active = None;
        self.resubscribe_at = None;
        self.fetches.abort_all();
        self.reconciler.dispose();
    }

    async fn shutdown(&mut self) {
        self.teardown().await;
        tracing::debug!(scope = %self.scope(), "Live collection disposed");
    }
}
