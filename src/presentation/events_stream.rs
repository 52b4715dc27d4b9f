// Server-sent event stream of store changes and connection transitions
use crate::application::connection_state::ConnectionSnapshot;
use crate::application::device_store::StoreChange;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

/// Emits `store` events for every applied mutation, `connection` events for
/// status transitions and `lagged` when the client fell behind the channel.
/// The current connection status is sent first.
pub fn change_stream(
    mut changes: broadcast::Receiver<StoreChange>,
    mut status: watch::Receiver<ConnectionSnapshot>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let initial = *status.borrow_and_update();
        if let Ok(event) = Event::default().event("connection").json_data(initial) {
            yield Ok(event);
        }

        loop {
            let next = tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => Some(Event::default().event("store").json_data(&change)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream client lagged, {} changes skipped", skipped);
                        Some(Ok(Event::default().event("lagged").data(skipped.to_string())))
                    }
                    Err(RecvError::Closed) => None,
                },
                changed = status.changed() => match changed {
                    Ok(()) => {
                        let snapshot = *status.borrow_and_update();
                        Some(Event::default().event("connection").json_data(snapshot))
                    }
                    Err(_) => None,
                },
            };

            match next {
                Some(Ok(event)) => yield Ok(event),
                Some(Err(e)) => tracing::warn!("Failed to encode event: {}", e),
                None => break,
            }
        }
        tracing::debug!("Event stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
