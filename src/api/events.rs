use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast;

use super::AppState;

/// Server-sent events carrying the list after every re-aggregation
pub async fn continue_watching_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.updates.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(list) => {
                let json = serde_json::to_string(&list).unwrap_or_default();
                Some((Ok(Event::default().event("continue_watching").data(json)), rx))
            }
            Err(broadcast::error::RecvError::Lagged(count)) => {
                tracing::warn!(missed = count, "Event stream client lagged");

                Some((
                    Ok(Event::default().event("warning").data("Missed some updates")),
                    rx,
                ))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
