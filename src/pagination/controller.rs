//! Pagination controller
//!
//! Drives a [`PageFetcher`] across pages for many independent views, merging
//! each page into the view's [`Collection`].
//!
//! Per view the controller enforces:
//! - at most one request in flight (single-flight),
//! - strictly sequential pages (each request needs the previous cursor),
//! - termination on a missing cursor, an empty page, or
//!   `stale_page_limit` consecutive pages that admit nothing new,
//! - discarding of results that arrive after a cancel or reset.

use super::types::{
    CollectionSnapshot, ControllerConfig, ControllerEvent, DrainEvent, LoadOutcome,
    PaginationState, Phase, ResourceKey,
};
use crate::auth::{Credential, NoopSignOut, SignOutHook};
use crate::dedup::Collection;
use crate::error::{Error, ErrorInfo, ErrorKind, Result};
use crate::fetch::{PageFetcher, PageRequest};
use crate::notify::NotificationQueue;
use crate::types::Page;
use futures::stream::{self, Stream};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-view bookkeeping
struct Entry {
    collection: Collection,
    state: PaginationState,
    /// Bumped on cancel/reset; results from an older generation are dropped
    generation: u64,
    cancel: CancellationToken,
}

impl Entry {
    fn new(generation: u64) -> Self {
        Self {
            collection: Collection::new(),
            state: PaginationState::new(),
            generation,
            cancel: CancellationToken::new(),
        }
    }

    fn snapshot(&self, key: &ResourceKey) -> CollectionSnapshot {
        CollectionSnapshot {
            key: key.clone(),
            items: self.collection.items().to_vec(),
            state: self.state.clone(),
        }
    }
}

/// Outcome of a single fetch-and-merge step
enum Step {
    Merged { exhausted: bool },
    Busy,
    AlreadyExhausted,
    AlreadyFailed(ErrorInfo),
    Failed(ErrorInfo),
    Cancelled,
}

/// Resets a view to `Idle` if its step future is dropped mid-request
struct InFlightGuard<'a, F> {
    controller: &'a PaginationController<F>,
    key: &'a ResourceKey,
    generation: u64,
    armed: bool,
}

impl<F> InFlightGuard<'_, F> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<F> Drop for InFlightGuard<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.controller.lock();
        let Some(entry) = entries.get_mut(self.key) else {
            return;
        };
        if entry.generation != self.generation || entry.state.phase != Phase::Fetching {
            return;
        }
        entry.state.phase = Phase::Idle;
        entry.state.in_flight = false;
        debug!(key = %self.key, "Page request abandoned");
        self.controller.publish(self.key, &entry.state);
    }
}

/// Orchestrates paginated fetching for any number of views
pub struct PaginationController<F> {
    fetcher: F,
    config: ControllerConfig,
    entries: Mutex<HashMap<ResourceKey, Entry>>,
    next_generation: AtomicU64,
    sign_out: Arc<dyn SignOutHook>,
    notifications: Option<Arc<NotificationQueue>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl<F: PageFetcher> PaginationController<F> {
    /// Create a controller with default tuning and no sign-out hook
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, ControllerConfig::default())
    }

    /// Create a controller with custom tuning
    pub fn with_config(fetcher: F, config: ControllerConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            fetcher,
            config,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            sign_out: Arc::new(NoopSignOut),
            notifications: None,
            events,
        }
    }

    /// Install the hook called when the upstream rejects the credential
    #[must_use]
    pub fn with_sign_out(mut self, hook: impl SignOutHook + 'static) -> Self {
        self.sign_out = Arc::new(hook);
        self
    }

    /// Post one error notification per failed run to this queue
    #[must_use]
    pub fn with_notifications(mut self, queue: Arc<NotificationQueue>) -> Self {
        self.notifications = Some(queue);
        self
    }

    /// Controller tuning
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Subscribe to state changes of every view
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Current items and state of a view
    ///
    /// Unknown views report an empty, idle snapshot.
    pub fn snapshot(&self, key: &ResourceKey) -> CollectionSnapshot {
        match self.lock().get(key) {
            Some(entry) => entry.snapshot(key),
            None => CollectionSnapshot {
                key: key.clone(),
                items: Vec::new(),
                state: PaginationState::new(),
            },
        }
    }

    /// Current state of a view
    pub fn state(&self, key: &ResourceKey) -> PaginationState {
        self.lock()
            .get(key)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Fetch exactly one more page of a view (incremental mode)
    pub async fn load_next_page(
        &self,
        key: &ResourceKey,
        credential: Option<&Credential>,
    ) -> LoadOutcome {
        let (_, step) = self.step(key, credential, None).await;
        match step {
            Step::Merged { exhausted: false } => LoadOutcome::Snapshot(self.snapshot(key)),
            Step::Merged { exhausted: true } | Step::AlreadyExhausted => {
                LoadOutcome::Exhausted(self.snapshot(key))
            }
            Step::Busy => LoadOutcome::InFlight(self.snapshot(key)),
            Step::AlreadyFailed(info) | Step::Failed(info) => failure_outcome(info),
            Step::Cancelled => LoadOutcome::Cancelled,
        }
    }

    /// Fetch every remaining page of a view (drain mode)
    ///
    /// Yields a snapshot after each merged page and ends with exactly one
    /// final event. Dropping the stream cancels the run; a response that
    /// arrives afterwards is discarded. The run is bound to the view it
    /// started on: after a `cancel`, `reset` or `discard` it ends with
    /// [`DrainEvent::Cancelled`] instead of fetching again.
    pub fn start_drain(
        self: &Arc<Self>,
        key: ResourceKey,
        credential: Option<Credential>,
    ) -> impl Stream<Item = DrainEvent> + Send + 'static
    where
        F: 'static,
    {
        let controller = Arc::clone(self);
        info!(key = %key, "Starting drain");

        stream::unfold(
            Some((controller, key, credential, None)),
            |run| async move {
                let Some((controller, key, credential, expected)) = run else {
                    return None;
                };
                let (generation, step) = controller
                    .step(&key, credential.as_ref(), expected)
                    .await;
                let event = match step {
                    Step::Merged { exhausted: false } => {
                        DrainEvent::Snapshot(controller.snapshot(&key))
                    }
                    Step::Merged { exhausted: true } | Step::AlreadyExhausted => {
                        DrainEvent::Exhausted(controller.snapshot(&key))
                    }
                    Step::Busy => DrainEvent::Busy(controller.snapshot(&key)),
                    Step::AlreadyFailed(info) | Step::Failed(info) => {
                        if info.kind == ErrorKind::Unauthorized {
                            DrainEvent::AuthExpired(info)
                        } else {
                            DrainEvent::Failed(info)
                        }
                    }
                    Step::Cancelled => DrainEvent::Cancelled,
                };

                let next = if event.is_final() {
                    if let DrainEvent::Exhausted(snapshot) = &event {
                        info!(key = %key, items = snapshot.len(), "Drain complete");
                    }
                    None
                } else {
                    Some((controller, key, credential, Some(generation)))
                };
                Some((event, next))
            },
        )
    }

    /// Drain a view and return the final snapshot
    ///
    /// Convenience over [`start_drain`](Self::start_drain) for consumers
    /// that only need the complete collection.
    pub async fn drain_all(
        self: &Arc<Self>,
        key: ResourceKey,
        credential: Option<Credential>,
    ) -> Result<CollectionSnapshot>
    where
        F: 'static,
    {
        use futures::StreamExt;

        let stream = self.start_drain(key.clone(), credential);
        futures::pin_mut!(stream);
        while let Some(event) = stream.next().await {
            match event {
                DrainEvent::Snapshot(_) => {}
                DrainEvent::Exhausted(snapshot) => return Ok(snapshot),
                DrainEvent::AuthExpired(info) | DrainEvent::Failed(info) => {
                    return Err(error_from_info(info))
                }
                DrainEvent::Busy(_) => {
                    return Err(Error::Other(format!("'{key}' is already being fetched")))
                }
                DrainEvent::Cancelled => {
                    return Err(Error::Other(format!("drain of '{key}' was cancelled")))
                }
            }
        }
        Err(Error::Other(format!("drain of '{key}' ended unexpectedly")))
    }

    /// Cancel any in-flight request for a view, keeping its items
    pub fn cancel(&self, key: &ResourceKey) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.cancel.cancel();
        entry.cancel = CancellationToken::new();
        entry.generation = self.next_generation();
        if entry.state.phase == Phase::Fetching {
            entry.state.phase = Phase::Idle;
        }
        entry.state.in_flight = false;
        debug!(key = %key, "Cancelled");
        self.publish(key, &entry.state);
    }

    /// Return a view to its initial state: idle, empty, no cursor
    pub fn reset(&self, key: &ResourceKey) {
        let mut entries = self.lock();
        if let Some(old) = entries.get(key) {
            old.cancel.cancel();
        }
        let entry = Entry::new(self.next_generation());
        debug!(key = %key, "Reset");
        self.publish(key, &entry.state);
        entries.insert(key.clone(), entry);
    }

    /// Forget a view entirely, cancelling any in-flight request
    pub fn discard(&self, key: &ResourceKey) {
        if let Some(entry) = self.lock().remove(key) {
            entry.cancel.cancel();
        }
    }

    /// One fetch-and-merge for a view
    ///
    /// Returns the generation the step ran against. With `expected` set, a
    /// view that was cancelled, reset or discarded since that generation is
    /// left untouched and the step reports [`Step::Cancelled`].
    async fn step(
        &self,
        key: &ResourceKey,
        credential: Option<&Credential>,
        expected: Option<u64>,
    ) -> (u64, Step) {
        let (generation, cancel, request) = {
            let mut entries = self.lock();
            if let Some(expected) = expected {
                if entries.get(key).map(|e| e.generation) != Some(expected) {
                    debug!(key = %key, "View changed since the run started, stopping");
                    return (expected, Step::Cancelled);
                }
            }
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(self.next_generation()));
            let generation = entry.generation;

            match entry.state.phase {
                Phase::Fetching => return (generation, Step::Busy),
                Phase::Exhausted => return (generation, Step::AlreadyExhausted),
                Phase::Failed => {
                    let info = entry.state.error.clone().unwrap_or_else(|| {
                        ErrorInfo::from(&Error::Other("failed".to_string()))
                    });
                    return (generation, Step::AlreadyFailed(info));
                }
                Phase::Idle => {}
            }

            entry.state.phase = Phase::Fetching;
            entry.state.in_flight = true;
            let request = PageRequest::new(key.resource_id.clone())
                .with_params(key.params.clone())
                .after(entry.state.cursor.clone())
                .limit(self.config.page_size);
            self.publish(key, &entry.state);
            (generation, entry.cancel.clone(), request)
        };

        let guard = InFlightGuard {
            controller: self,
            key,
            generation,
            armed: true,
        };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.fetch_with_retry(&request, credential) => Some(result),
        };
        guard.disarm();

        let Some(result) = result else {
            debug!(key = %key, "Discarding cancelled request");
            return (generation, Step::Cancelled);
        };

        let step = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(key) else {
                return (generation, Step::Cancelled);
            };
            if entry.generation != generation {
                debug!(key = %key, "Discarding stale response");
                return (generation, Step::Cancelled);
            }
            let step = match result {
                Ok(page) => self.apply_page(key, entry, page),
                Err(err) => {
                    let info = ErrorInfo::from(&err);
                    entry.state.phase = Phase::Failed;
                    entry.state.in_flight = false;
                    entry.state.error = Some(info.clone());
                    Step::Failed(info)
                }
            };
            self.publish(key, &entry.state);
            step
        };

        if let Step::Failed(info) = &step {
            self.escalate(key, info);
        }
        (generation, step)
    }

    fn apply_page(&self, key: &ResourceKey, entry: &mut Entry, page: Page) -> Step {
        let admitted = entry.collection.merge_in_place(&page.items);
        let state = &mut entry.state;
        state.pages_fetched += 1;
        state.in_flight = false;
        state.stale_pages = if admitted == 0 {
            state.stale_pages + 1
        } else {
            0
        };

        let stale = state.stale_pages >= self.config.stale_page_limit;
        if stale && !page.is_last() {
            warn!(
                key = %key,
                pages = state.stale_pages,
                "Upstream keeps paging without new items, stopping"
            );
        }

        let exhausted = page.is_last() || stale;
        if let Some(cursor) = page.next_cursor {
            state.cursor = Some(cursor);
        }
        state.exhausted = exhausted;
        state.phase = if exhausted {
            Phase::Exhausted
        } else {
            Phase::Idle
        };

        debug!(
            key = %key,
            page = state.pages_fetched,
            admitted,
            total = entry.collection.len(),
            exhausted,
            "Merged page"
        );
        Step::Merged { exhausted }
    }

    async fn fetch_with_retry(
        &self,
        request: &PageRequest,
        credential: Option<&Credential>,
    ) -> Result<Page> {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch_page(request, credential).await {
                Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Fetch of {} failed ({err}), attempt {}/{}, retrying in {:?}",
                        request.resource_id,
                        attempt + 1,
                        policy.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Report a fresh failure: sign-out for auth, one notification per run
    fn escalate(&self, key: &ResourceKey, info: &ErrorInfo) {
        let auth = info.kind == ErrorKind::Unauthorized;
        if auth {
            warn!(key = %key, "Credential rejected, requesting sign-out");
            self.sign_out.sign_out();
        } else {
            warn!(key = %key, error = %info, "Fetch failed");
        }

        if let Some(queue) = &self.notifications {
            let title = if auth {
                "Session expired".to_string()
            } else {
                format!("Failed to load {}", key.resource_id)
            };
            queue.error(title, info.message.clone());
        }
    }
}

impl<F> PaginationController<F> {
    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Called with the entries lock held so events keep the order of the
    /// state changes they report
    fn publish(&self, key: &ResourceKey, state: &PaginationState) {
        // No subscribers is fine
        let _ = self.events.send(ControllerEvent {
            key: key.clone(),
            state: state.clone(),
        });
    }
}

impl<F> std::fmt::Debug for PaginationController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationController")
            .field("config", &self.config)
            .field("has_notifications", &self.notifications.is_some())
            .finish_non_exhaustive()
    }
}

fn failure_outcome(info: ErrorInfo) -> LoadOutcome {
    if info.kind == ErrorKind::Unauthorized {
        LoadOutcome::AuthExpired(info)
    } else {
        LoadOutcome::Failed(info)
    }
}

/// Rebuild an error from its summary for `Result`-based callers
pub(crate) fn error_from_info(info: ErrorInfo) -> Error {
    match info.kind {
        ErrorKind::Unauthorized => Error::Unauthorized {
            status: info.status.unwrap_or(401),
        },
        ErrorKind::ServerError => Error::ServerError {
            status: info.status.unwrap_or(500),
            body: info.message,
        },
        ErrorKind::ClientError => Error::ClientError {
            status: info.status.unwrap_or(400),
            body: info.message,
        },
        ErrorKind::MissingCredential => Error::MissingCredential {
            resource: info.message,
        },
        ErrorKind::NetworkError => Error::network(info.message),
        ErrorKind::MalformedResponse => Error::malformed(info.message),
        ErrorKind::Internal => Error::Other(info.message),
    }
}
