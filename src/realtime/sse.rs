use crate::realtime::registry::ConnectionGuard;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Path},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde_json::json;
use std::{convert::Infallible, time::Duration};
use tracing::{info, warn};

/// Server-sent event feed for one event's room.
///
/// The stream owns a registry connection for as long as the client reads it;
/// dropping the stream disconnects it.
pub async fn results_sse(
    Extension(app_state): Extension<AppState>,
    Path(event_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let registry = app_state.broadcaster.registry().clone();
    let (connection_id, mut updates) = registry.connect().await;
    registry.join(connection_id, &event_id).await;
    info!(event_id = %event_id, connection_id = %connection_id, "SSE observer joined room");
    let guard = ConnectionGuard::new(registry, connection_id);

    let stream = async_stream::stream! {
        let _guard = guard;

        match app_state.results.find(&event_id).await {
            Ok(Some(tally)) => {
                if let Ok(event) = Event::default().event("init").json_data(&tally) {
                    yield Ok(event);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "failed to load stored tally");
                yield Ok(Event::default()
                    .event("error")
                    .data(json!({"error": "Database error"}).to_string()));
            }
        }

        while let Some(tally) = updates.recv().await {
            match Event::default().event("update").json_data(&*tally) {
                Ok(event) => {
                    yield Ok(event);
                }
                Err(e) => {
                    warn!(event_id = %event_id, error = %e, "failed to encode tally update");
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
