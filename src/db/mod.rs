//! Progress storage port
//!
//! The continue-watching pipeline only talks to storage through
//! [`ProgressStore`], so the same code runs over Redis in production and an
//! in-memory map in tests. Writers publish a [`ChangeSignal`] per key; readers
//! subscribe and decide whether the key concerns them.

use tokio::sync::broadcast;

use crate::error::AppResult;

pub mod memory;
pub mod redis;

pub use memory::InMemoryProgressStore;
pub use self::redis::{create_redis_client, RedisProgressStore};

const SIGNAL_CAPACITY: usize = 256;

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOrigin {
    /// This process wrote the key
    Local,
    /// Another instance sharing the same backing store wrote the key
    Remote,
}

/// Notification that a storage key changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub key: String,
    pub origin: SignalOrigin,
}

/// Fan-out of change signals to any number of subscribers
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeSignal>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self, key: &str, origin: SignalOrigin) {
        let signal = ChangeSignal {
            key: key.to_string(),
            origin,
        };

        // No subscribers is fine; nobody is showing the list yet.
        if self.tx.send(signal).is_err() {
            tracing::trace!(key = %key, "Change signal dropped, no subscribers");
        }
    }

    pub fn notify_local(&self, key: &str) {
        self.notify(key, SignalOrigin::Local);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSignal> {
        self.tx.subscribe()
    }
}

/// Flat key-value storage holding raw progress slots
///
/// `put`/`remove` are the quiet primitives. `set`/`delete` additionally
/// publish a change signal and are what writers outside the pipeline use.
#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    /// All keys, in storage-iteration order
    async fn keys(&self) -> AppResult<Vec<String>>;

    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Writes a value without publishing a change signal
    async fn put(&self, key: &str, value: &str) -> AppResult<()>;

    /// Deletes a value without publishing a change signal.
    /// Returns whether a value existed.
    async fn remove(&self, key: &str) -> AppResult<bool>;

    fn notifier(&self) -> &ChangeNotifier;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.put(key, value).await?;
        self.notifier().notify_local(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let removed = self.remove(key).await?;
        if removed {
            self.notifier().notify_local(key);
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSignal> {
        self.notifier().subscribe()
    }
}
