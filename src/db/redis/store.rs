use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::{ChangeNotifier, ProgressStore, SignalOrigin};
use crate::error::AppResult;
use crate::models::PROGRESS_KEY_PREFIX;

/// Pub/sub channel carrying change signals between instances
pub const SIGNAL_CHANNEL: &str = "progress_changes";

/// Creates a Redis client for progress storage
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Change signal as published on [`SIGNAL_CHANNEL`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SignalMessage {
    origin: Uuid,
    key: String,
}

/// Progress storage shared by every instance pointed at the same Redis
///
/// Each write is published on [`SIGNAL_CHANNEL`] tagged with this instance's
/// id. A bridge task re-emits other instances' messages locally as
/// [`SignalOrigin::Remote`] and skips our own, which were already emitted as
/// [`SignalOrigin::Local`] at write time.
#[derive(Clone)]
pub struct RedisProgressStore {
    conn: ConnectionManager,
    instance_id: Uuid,
    notifier: ChangeNotifier,
}

/// Handle for gracefully shutting down the signal bridge
pub struct SignalBridgeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SignalBridgeHandle {
    /// Stops relaying remote change signals
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Signal bridge shutdown signal sent");
    }
}

impl RedisProgressStore {
    /// Connects to Redis and spawns the background signal bridge
    pub async fn connect(client: Client) -> AppResult<(Self, SignalBridgeHandle)> {
        let conn = ConnectionManager::new(client.clone()).await?;
        let instance_id = Uuid::new_v4();
        let notifier = ChangeNotifier::new();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let bridge_notifier = notifier.clone();
        tokio::spawn(async move {
            Self::signal_bridge_task(client, instance_id, bridge_notifier, shutdown_rx).await;
        });

        tracing::info!(instance_id = %instance_id, "Connected Redis progress store");

        let store = Self {
            conn,
            instance_id,
            notifier,
        };

        Ok((store, SignalBridgeHandle { shutdown_tx }))
    }

    /// Background task relaying change signals published by other instances
    async fn signal_bridge_task(
        client: Client,
        instance_id: Uuid,
        notifier: ChangeNotifier,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut pubsub = match client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open Redis pub/sub connection");
                return;
            }
        };

        if let Err(e) = pubsub.subscribe(SIGNAL_CHANNEL).await {
            tracing::error!(error = %e, channel = SIGNAL_CHANNEL, "Failed to subscribe");
            return;
        }

        tracing::info!(channel = SIGNAL_CHANNEL, "Signal bridge task started");
        let mut messages = std::pin::pin!(pubsub.on_message());

        loop {
            tokio::select! {
                msg = messages.next() => {
                    let Some(msg) = msg else {
                        tracing::warn!("Redis pub/sub stream closed");
                        break;
                    };

                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "Unreadable change signal payload");
                            continue;
                        }
                    };

                    if let Some(key) = Self::remote_key(&payload, instance_id) {
                        tracing::debug!(key = %key, "Remote change signal");
                        notifier.notify(&key, SignalOrigin::Remote);
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Signal bridge task stopped");
                    break;
                }
            }
        }
    }

    /// Extracts the changed key from a foreign signal. Our own echoes and
    /// malformed payloads yield `None`.
    fn remote_key(payload: &str, instance_id: Uuid) -> Option<String> {
        match serde_json::from_str::<SignalMessage>(payload) {
            Ok(msg) if msg.origin != instance_id => Some(msg.key),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, payload = %payload, "Malformed change signal");
                None
            }
        }
    }

    fn encode_signal(&self, key: &str) -> AppResult<String> {
        let msg = SignalMessage {
            origin: self.instance_id,
            key: key.to_string(),
        };
        Ok(serde_json::to_string(&msg)?)
    }

    /// Publishes a change signal for other instances. Failure is logged only;
    /// the write itself already succeeded.
    async fn publish(&self, key: &str) {
        let payload = match self.encode_signal(key) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Change signal serialization error");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let published: redis::RedisResult<i64> = conn.publish(SIGNAL_CHANNEL, payload).await;
        if let Err(e) = published {
            tracing::warn!(error = %e, key = %key, "Failed to publish change signal");
        }
    }
}

#[async_trait::async_trait]
impl ProgressStore for RedisProgressStore {
    async fn keys(&self) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = conn.keys(format!("{}*", PROGRESS_KEY_PREFIX)).await?;
        sort_keys(&mut keys);
        Ok(keys)
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn name(&self) -> &'static str {
        "redis"
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.put(key, value).await?;
        self.notifier.notify_local(key);
        self.publish(key).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let removed = self.remove(key).await?;
        if removed {
            self.notifier.notify_local(key);
            self.publish(key).await;
        }
        Ok(removed)
    }
}

/// `KEYS` replies in hash-table order; listing order must be stable between passes
fn sort_keys(keys: &mut [String]) {
    keys.sort_unstable();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_listing_order_is_stable() {
        let mut first = vec![
            "progress_tv_42".to_string(),
            "progress_movie_7".to_string(),
            "progress_movie_10".to_string(),
        ];
        let mut second = vec![
            "progress_movie_10".to_string(),
            "progress_tv_42".to_string(),
            "progress_movie_7".to_string(),
        ];

        sort_keys(&mut first);
        sort_keys(&mut second);

        assert_eq!(first, second);
        assert_eq!(first[0], "progress_movie_10");
    }

    #[test]
    fn test_remote_key_from_other_instance() {
        let payload = serde_json::to_string(&SignalMessage {
            origin: Uuid::new_v4(),
            key: "progress_tv_42".to_string(),
        })
        .unwrap();

        let key = RedisProgressStore::remote_key(&payload, Uuid::new_v4());
        assert_eq!(key.as_deref(), Some("progress_tv_42"));
    }

    #[test]
    fn test_remote_key_skips_own_echo() {
        let me = Uuid::new_v4();
        let payload = serde_json::to_string(&SignalMessage {
            origin: me,
            key: "progress_tv_42".to_string(),
        })
        .unwrap();

        assert_eq!(RedisProgressStore::remote_key(&payload, me), None);
    }

    #[test]
    fn test_remote_key_ignores_malformed_payload() {
        assert_eq!(
            RedisProgressStore::remote_key("progress_tv_42", Uuid::new_v4()),
            None
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_set_get_delete_round_trip() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (store, handle) = RedisProgressStore::connect(client).await.unwrap();
        let mut rx = store.subscribe();

        let key = "progress_movie_test_round_trip";
        store.set(key, r#"{"currentTime":1,"duration":2}"#).await.unwrap();
        assert!(store.keys().await.unwrap().contains(&key.to_string()));
        assert_eq!(rx.recv().await.unwrap().origin, SignalOrigin::Local);

        assert!(store.delete(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), None);

        handle.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_signal_reaches_other_instance() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let (writer, writer_handle) =
            RedisProgressStore::connect(create_redis_client(&redis_url).unwrap())
                .await
                .unwrap();
        let (reader, reader_handle) =
            RedisProgressStore::connect(create_redis_client(&redis_url).unwrap())
                .await
                .unwrap();
        let mut rx = reader.subscribe();

        // Give the reader's bridge time to subscribe
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let key = "progress_tv_test_cross_instance";
        writer.set(key, "{}").await.unwrap();

        let signal = tokio::time::timeout(tokio::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.key, key);
        assert_eq!(signal.origin, SignalOrigin::Remote);

        writer.remove(key).await.unwrap();
        writer_handle.shutdown().await;
        reader_handle.shutdown().await;
    }
}
