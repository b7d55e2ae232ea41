use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::ProgressRecord;
use crate::services::ContinueWatchingService;

const UPDATE_CAPACITY: usize = 16;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub continue_watching: ContinueWatchingService,
    /// Lists produced by re-aggregation, fanned out to event stream clients
    pub updates: broadcast::Sender<Vec<ProgressRecord>>,
}

impl AppState {
    pub fn new(continue_watching: ContinueWatchingService) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            continue_watching,
            updates,
        }
    }

    /// Re-aggregates on every progress change and publishes the result
    pub fn start_watcher(&self) -> JoinHandle<()> {
        let updates = self.updates.clone();
        self.continue_watching.on_progress_changed(move |list| {
            tracing::debug!(count = list.len(), "Publishing continue-watching update");
            // Nobody listening is fine
            let _ = updates.send(list);
        })
    }
}
