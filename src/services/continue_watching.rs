use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};

use crate::{
    db::{ChangeSignal, ProgressStore},
    error::{AppError, AppResult},
    models::{MediaType, ProgressKey, ProgressRecord},
    services::{aggregator, enricher::DetailEnricher, normalizer, providers::CatalogProvider},
};

/// Continue-watching pipeline
///
/// Reads every progress slot, normalizes it, enriches it with catalog detail
/// and returns the ordered list. Also owns the write side used by players and
/// the presentation layer (record, remove) and the change subscription.
#[derive(Clone)]
pub struct ContinueWatchingService {
    store: Arc<dyn ProgressStore>,
    enricher: DetailEnricher,
    debounce: Duration,
}

impl ContinueWatchingService {
    pub fn new(store: Arc<dyn ProgressStore>, catalog: Arc<dyn CatalogProvider>) -> Self {
        let enricher = DetailEnricher::new(catalog, store.clone());
        Self {
            store,
            enricher,
            debounce: Duration::ZERO,
        }
    }

    /// Coalesce change signals arriving within `window` into a single pass
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Runs a full aggregation pass
    ///
    /// Never fails. If storage itself is unreachable the list is empty.
    pub async fn list(&self) -> Vec<ProgressRecord> {
        match self.run_pipeline().await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "Continue-watching pass failed");
                Vec::new()
            }
        }
    }

    async fn run_pipeline(&self) -> AppResult<Vec<ProgressRecord>> {
        let start = Instant::now();
        let keys = self.store.keys().await?;

        let mut candidates = Vec::new();
        for key in keys {
            let Some(progress_key) = ProgressKey::parse(&key) else {
                continue;
            };

            let raw = match self.store.get(&key).await {
                Ok(Some(raw)) => raw,
                // Removed since the key listing
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to read progress slot");
                    continue;
                }
            };

            let Some(record) = normalizer::normalize(&progress_key, &raw) else {
                continue;
            };

            // Finished titles would be dropped anyway; don't spend a lookup on them
            if !record.is_valid() {
                tracing::debug!(key = %key, "Skipping finished or durationless record");
                continue;
            }

            candidates.push(record);
        }

        let candidate_count = candidates.len();
        let enriched = self.enricher.enrich_batch(candidates).await;
        let list = aggregator::aggregate(enriched);

        tracing::info!(
            candidates = candidate_count,
            shown = list.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Continue-watching list aggregated"
        );

        Ok(list)
    }

    /// Stores raw progress reported by a player and signals the change
    pub async fn record_progress(
        &self,
        media_type: MediaType,
        media_id: &str,
        raw: &Value,
    ) -> AppResult<()> {
        if media_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Media id cannot be empty".to_string(),
            ));
        }

        if !raw.is_object() {
            return Err(AppError::InvalidInput(
                "Progress payload must be a JSON object".to_string(),
            ));
        }

        let key = ProgressKey::new(media_type, media_id).storage_key();
        self.store.set(&key, &raw.to_string()).await?;

        tracing::debug!(key = %key, "Progress recorded");
        Ok(())
    }

    /// Deletes a title's progress slot and signals the change
    ///
    /// Returns whether anything was stored.
    pub async fn remove_progress(&self, media_type: MediaType, media_id: &str) -> AppResult<bool> {
        let key = ProgressKey::new(media_type, media_id).storage_key();
        let removed = self.store.delete(&key).await?;

        tracing::info!(key = %key, removed = removed, "Progress removal requested");
        Ok(removed)
    }

    /// Whether a change signal concerns progress data
    pub fn is_relevant(&self, signal: &ChangeSignal) -> bool {
        ProgressKey::in_namespace(&signal.key)
    }

    /// Reruns the pipeline for a relevant signal; `None` for unrelated keys
    pub async fn handle_signal(&self, signal: &ChangeSignal) -> Option<Vec<ProgressRecord>> {
        if !self.is_relevant(signal) {
            tracing::trace!(key = %signal.key, "Ignoring unrelated change signal");
            return None;
        }

        tracing::debug!(key = %signal.key, origin = ?signal.origin, "Progress changed");
        Some(self.list().await)
    }

    /// Registers `listener` to receive a fresh list after every relevant change
    ///
    /// The subscription is taken before this returns, so no signal sent
    /// afterwards is missed. Each pass runs as its own task and is never
    /// cancelled, so a slow catalog lookup can't hold back later passes.
    /// Passes are numbered; a result older than one already delivered is
    /// discarded, so the latest pass always wins. Abort the returned handle
    /// to unsubscribe; in-flight passes are aborted with it.
    pub fn on_progress_changed<F>(&self, listener: F) -> JoinHandle<()>
    where
        F: FnMut(Vec<ProgressRecord>) + Send + 'static,
    {
        let service = self.clone();
        let mut rx = self.store.subscribe();
        let delivery = Arc::new(Mutex::new(Delivery {
            latest: 0,
            listener,
        }));

        tokio::spawn(async move {
            let mut passes = JoinSet::new();
            let mut generation: u64 = 0;

            loop {
                let received = tokio::select! {
                    received = rx.recv() => received,
                    Some(finished) = passes.join_next() => {
                        if let Err(e) = finished {
                            tracing::error!(error = %e, "Continue-watching pass failed");
                        }
                        continue;
                    }
                };

                let relevant = match received {
                    Ok(signal) => service.is_relevant(&signal),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed = missed, "Change signals lagged, rerunning");
                        true
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Change signal channel closed");
                        break;
                    }
                };

                if !relevant {
                    continue;
                }

                if !service.debounce.is_zero() {
                    tokio::time::sleep(service.debounce).await;
                    service.drain_pending(&mut rx);
                }

                generation += 1;
                let pass = generation;
                let service = service.clone();
                let delivery = delivery.clone();

                passes.spawn(async move {
                    let list = service.list().await;

                    let mut delivery = delivery.lock().await;
                    if pass < delivery.latest {
                        tracing::debug!(pass = pass, latest = delivery.latest, "Discarding superseded pass");
                        return;
                    }
                    delivery.latest = pass;
                    (delivery.listener)(list);
                });
            }

            // Let passes already triggered finish before unsubscribing
            while passes.join_next().await.is_some() {}
        })
    }

    /// Discards signals queued during the debounce window
    fn drain_pending(&self, rx: &mut tokio::sync::broadcast::Receiver<ChangeSignal>) {
        let mut coalesced = 0;
        loop {
            match rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => coalesced += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if coalesced > 0 {
            tracing::debug!(coalesced = coalesced, "Coalesced change signals");
        }
    }
}

/// Listener plus the newest pass it has been given
struct Delivery<F> {
    latest: u64,
    listener: F,
}
