use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{Store, StoreReader};

/// A remote resource a [`Poller`] can fetch repeatedly.
///
/// # Example
///
/// ```ignore
/// use fleet_tracker::*;
///
/// struct Discovery(LifecycleClient);
///
/// impl Probe for Discovery {
///     type Response = DiscoveryStatus;
///     type Snapshot = DiscoveryStatus;
///
///     async fn fetch(&self) -> Result<DiscoveryStatus> {
///         self.0.discovery_status().await
///     }
///
///     fn accept(&self, fetched: Result<DiscoveryStatus>) -> Result<DiscoveryStatus> {
///         fetched
///     }
///
///     fn is_complete(&self, status: &DiscoveryStatus) -> bool {
///         status.progress().is_complete()
///     }
/// }
/// ```
pub trait Probe: Send + Sync + 'static {
    /// What one fetch returns from the backend.
    type Response: Send + 'static;
    /// What the poller publishes.
    type Snapshot: Clone + Send + Sync + 'static;

    /// Fetch one response. Must not change any state observers can see.
    fn fetch(&self) -> impl Future<Output = Result<Self::Response>> + Send;

    /// Turn a fetch outcome into a snapshot. Only called for responses that
    /// belong to the current run, so any state the probe keeps is updated
    /// here and not in [`fetch`](Self::fetch).
    fn accept(&self, fetched: Result<Self::Response>) -> Result<Self::Snapshot>;

    /// Whether polling can stop once this snapshot has been seen.
    fn is_complete(&self, snapshot: &Self::Snapshot) -> bool;

    /// Label used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Lifecycle of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Fetches that succeeded and were applied.
    pub fetched: u64,
    /// Fetches that failed and will be retried on the next tick.
    pub failed: u64,
    /// Ticks skipped because a fetch was still in flight.
    pub skipped: u64,
    /// Responses that arrived after their run had ended.
    pub discarded: u64,
}

struct Control {
    state: PollerState,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared<P: Probe> {
    probe: P,
    interval: Duration,
    control: Mutex<Control>,
    /// Generation of the fetch in flight, or [`IDLE`].
    in_flight: AtomicU64,
    snapshot: Store<Option<P::Snapshot>>,
    complete: Store<bool>,
    stats: Mutex<PollStats>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

const IDLE: u64 = 0;

/// Clears the in-flight marker when the fetch task ends, however it ends,
/// unless a newer run has already claimed it.
struct InFlight<'a> {
    slot: &'a AtomicU64,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.generation, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Repeatedly fetches a [`Probe`] on a fixed interval until its completion
/// predicate holds.
///
/// - [`start()`](Self::start) fetches immediately, then once per interval.
///   Calling it while already polling does nothing.
/// - A tick that fires while the previous fetch of the same run is still
///   running is skipped. A restart does not wait for the old run's fetch.
/// - Failed fetches are logged and retried on the next tick.
/// - On completion the timer is cancelled and observers are signalled once.
/// - [`stop()`](Self::stop) and dropping the poller cancel the timer. Any
///   response still in flight is discarded when it lands.
///
/// Must be started from within a tokio runtime.
pub struct Poller<P: Probe> {
    shared: Arc<Shared<P>>,
}

impl<P: Probe> Poller<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                probe,
                interval,
                control: Mutex::new(Control {
                    state: PollerState::Idle,
                    generation: 0,
                    timer: None,
                }),
                in_flight: AtomicU64::new(IDLE),
                snapshot: Store::new(None),
                complete: Store::new(false),
                stats: Mutex::new(PollStats::default()),
            }),
        }
    }

    /// Begin polling. No-op if already polling; from `Stopped` this starts a
    /// fresh run whose completion is signalled again.
    pub fn start(&self) {
        let mut control = lock(&self.shared.control);
        if control.state == PollerState::Polling {
            return;
        }
        if let Some(timer) = control.timer.take() {
            timer.abort();
        }
        control.generation += 1;
        control.state = PollerState::Polling;
        let generation = control.generation;

        self.shared.complete.update(|done| std::mem::replace(done, false));

        info!(
            probe = self.shared.probe.name(),
            interval_ms = self.shared.interval.as_millis() as u64,
            "Polling started"
        );
        let shared = Arc::clone(&self.shared);
        control.timer = Some(tokio::spawn(run_timer(shared, generation)));
    }

    /// Cancel the timer and move to `Stopped`. Idempotent.
    pub fn stop(&self) {
        let mut control = lock(&self.shared.control);
        if let Some(timer) = control.timer.take() {
            timer.abort();
        }
        if control.state == PollerState::Polling {
            info!(probe = self.shared.probe.name(), "Polling stopped");
        }
        control.generation += 1;
        control.state = PollerState::Stopped;
    }

    pub fn state(&self) -> PollerState {
        lock(&self.shared.control).state
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollerState::Polling
    }

    /// Whether the current run has reached completion.
    pub fn is_complete(&self) -> bool {
        self.shared.complete.snapshot()
    }

    /// Most recent successfully fetched snapshot.
    pub fn snapshot(&self) -> Option<P::Snapshot> {
        self.shared.snapshot.snapshot()
    }

    /// Read-only view of published snapshots.
    pub fn reader(&self) -> StoreReader<Option<P::Snapshot>> {
        self.shared.snapshot.reader()
    }

    /// Read-only completion flag.
    pub fn completion(&self) -> StoreReader<bool> {
        self.shared.complete.reader()
    }

    /// Resolve once the current run completes.
    pub async fn wait_complete(&self) {
        let mut completion = self.completion();
        completion.wait_for(|done| *done).await;
    }

    pub fn stats(&self) -> PollStats {
        *lock(&self.shared.stats)
    }

    pub fn probe(&self) -> &P {
        &self.shared.probe
    }
}

impl<P: Probe> Drop for Poller<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<P: Probe> std::fmt::Debug for Poller<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("probe", &self.shared.probe.name())
            .field("interval", &self.shared.interval)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_timer<P: Probe>(shared: Arc<Shared<P>>, generation: u64) {
    let mut ticker = tokio::time::interval(shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        // First tick fires immediately.
        ticker.tick().await;
        let control = lock(&shared.control);
        if !Shared::<P>::owns(&control, generation) {
            break;
        }
        // Dispatch under the lock so no fetch starts after `stop()` returns.
        Shared::dispatch(&shared, generation);
    }
}

impl<P: Probe> Shared<P> {
    fn owns(control: &Control, generation: u64) -> bool {
        control.generation == generation && control.state == PollerState::Polling
    }

    fn is_current(&self, generation: u64) -> bool {
        Self::owns(&lock(&self.control), generation)
    }

    fn dispatch(shared: &Arc<Self>, generation: u64) {
        if shared.in_flight.swap(generation, Ordering::AcqRel) == generation {
            lock(&shared.stats).skipped += 1;
            debug!(probe = shared.probe.name(), "Previous fetch still in flight, skipping tick");
            return;
        }
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            let _guard = InFlight {
                slot: &shared.in_flight,
                generation,
            };
            if !shared.is_current(generation) {
                return;
            }
            let result = shared.probe.fetch().await;
            shared.apply(generation, result);
        });
    }

    fn apply(&self, generation: u64, fetched: Result<P::Response>) {
        let mut control = lock(&self.control);
        if !Self::owns(&control, generation) {
            lock(&self.stats).discarded += 1;
            debug!(probe = self.probe.name(), "Discarding response from a finished run");
            return;
        }

        match self.probe.accept(fetched) {
            Ok(snapshot) => {
                let done = self.probe.is_complete(&snapshot);
                self.snapshot.set(Some(snapshot));
                lock(&self.stats).fetched += 1;

                if done {
                    control.state = PollerState::Stopped;
                    control.generation += 1;
                    if let Some(timer) = control.timer.take() {
                        timer.abort();
                    }
                    self.complete.set(true);
                    info!(probe = self.probe.name(), "Job complete, polling stopped");
                }
            }
            Err(e) => {
                lock(&self.stats).failed += 1;
                warn!(
                    probe = self.probe.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "Poll fetch failed, retrying next tick"
                );
            }
        }
    }
}
