use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::AbortHandle;
use tracing::debug;

use crate::client::LifecycleClient;
use crate::error::Result;

/// Queries shorter than this are answered locally with no results.
pub const MIN_QUERY_LEN: usize = 1;

#[derive(Default)]
struct SlotState {
    ticket: u64,
    in_flight: Option<AbortHandle>,
}

fn lock_slot(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Aborts the spawned request if the caller stops waiting for it while it
/// is still the newest.
struct AbortOnDrop<'a> {
    state: &'a Mutex<SlotState>,
    ticket: u64,
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = lock_slot(self.state);
        if state.ticket == self.ticket {
            if let Some(request) = state.in_flight.take() {
                request.abort();
            }
        }
    }
}

/// Runs at most one request at a time, newest wins.
///
/// Each [`issue`](Self::issue) aborts whatever the previous call started.
/// A superseded call resolves to `None`, even if its request had already
/// finished, so stale results never overwrite fresh ones. Dropping the
/// future returned by `issue` aborts its request.
pub struct LatestRequest<T> {
    state: Arc<Mutex<SlotState>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Clone for LatestRequest<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Default for LatestRequest<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::default())),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Send + 'static> LatestRequest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        lock_slot(&self.state)
    }

    /// Run `request`, superseding any earlier one. Must be called within a
    /// tokio runtime.
    pub async fn issue<F>(&self, request: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (ticket, task) = {
            let mut state = self.lock();
            state.ticket += 1;
            if let Some(previous) = state.in_flight.take() {
                previous.abort();
            }
            let task = tokio::spawn(request);
            state.in_flight = Some(task.abort_handle());
            (state.ticket, task)
        };
        let _abort = AbortOnDrop {
            state: &self.state,
            ticket,
        };

        let value = match task.await {
            Ok(value) => value,
            Err(e) if e.is_cancelled() => return None,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let mut state = self.lock();
        if state.ticket != ticket {
            debug!(ticket, current = state.ticket, "Dropping superseded response");
            return None;
        }
        state.in_flight = None;
        Some(value)
    }

    /// Abort the in-flight request, if any. Its caller receives `None`.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.ticket += 1;
        if let Some(previous) = state.in_flight.take() {
            previous.abort();
        }
    }
}

/// Type-ahead customer search on top of [`LatestRequest`].
#[derive(Clone)]
pub struct CustomerSearch {
    client: LifecycleClient,
    slot: LatestRequest<Result<Vec<String>>>,
}

impl CustomerSearch {
    pub fn new(client: LifecycleClient) -> Self {
        Self {
            client,
            slot: LatestRequest::new(),
        }
    }

    /// Search for `query`. Returns `None` when a newer search replaced
    /// this one before it finished.
    pub async fn search(&self, query: &str) -> Option<Result<Vec<String>>> {
        let query = query.trim().to_string();
        if query.chars().count() < MIN_QUERY_LEN {
            self.slot.cancel();
            return Some(Ok(Vec::new()));
        }
        let client = self.client.clone();
        self.slot
            .issue(async move { client.search_customers(&query).await })
            .await
    }
}
