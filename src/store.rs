use tokio::sync::watch;

/// Single-writer state container.
///
/// The owner mutates through `&mut self` or `&self` on the store it holds;
/// consumers get a [`StoreReader`] that can only observe. Each bounded
/// context (inventory, batch view, poller snapshots) owns its own store and
/// hands readers to whoever renders it.
#[derive(Debug)]
pub struct Store<T> {
    tx: watch::Sender<T>,
}

impl<T> Store<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the whole value and notify readers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate in place. Readers are notified only if `f` returns `true`.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.tx.send_if_modified(f)
    }

    /// Hand out a read-only view.
    pub fn reader(&self) -> StoreReader<T> {
        StoreReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone> Store<T> {
    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Read-only handle onto a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreReader<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> StoreReader<T> {
    /// Clone the current value.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next published value. Returns `None` once the owning
    /// store has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the value satisfies `predicate`, returning it. Returns
    /// `None` if the store is dropped first.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.rx.wait_for(predicate).await.ok().map(|v| v.clone())
    }
}
