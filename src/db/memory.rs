use tokio::sync::RwLock;

use super::{ChangeNotifier, ProgressStore};
use crate::error::AppResult;

/// Process-local progress storage
///
/// Keeps insertion order so iteration behaves like browser storage: an
/// overwrite keeps the key's original position.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    entries: RwLock<Vec<(String, String)>>,
    notifier: ChangeNotifier,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with the given slots, in order
    pub fn seeded<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut slots: Vec<(String, String)> = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            let value = value.into();
            match slots.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => slots.push((key, value)),
            }
        }

        Self {
            entries: RwLock::new(slots),
            notifier: ChangeNotifier::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn keys(&self) -> AppResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().map(|(k, _)| k.clone()).collect())
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    async fn put(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        Ok(entries.len() != before)
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ChangeSignal, SignalOrigin};
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn test_overwrite_keeps_iteration_position() {
        let store = InMemoryProgressStore::seeded([("a", "1"), ("b", "2"), ("c", "3")]);

        store.put("a", "10").await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_seeded_duplicate_keys_last_write_wins() {
        let store = InMemoryProgressStore::seeded([("a", "1"), ("a", "2")]);

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_put_is_quiet_set_is_signalled() {
        let store = InMemoryProgressStore::new();
        let mut rx = store.subscribe();

        store.put("progress_movie_1", "{}").await.unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        store.set("progress_movie_2", "{}").await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeSignal {
                key: "progress_movie_2".to_string(),
                origin: SignalOrigin::Local,
            }
        );
    }

    #[tokio::test]
    async fn test_delete_signals_only_when_something_was_removed() {
        let store = InMemoryProgressStore::seeded([("progress_tv_42", "{}")]);
        let mut rx = store.subscribe();

        assert!(!store.delete("progress_tv_7").await.unwrap());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        assert!(store.delete("progress_tv_42").await.unwrap());
        assert_eq!(rx.try_recv().unwrap().key, "progress_tv_42");
        assert!(store.is_empty().await);
    }
}
