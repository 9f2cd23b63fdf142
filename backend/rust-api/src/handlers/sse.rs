use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::quiz_error;
use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{session::SessionSnapshot, timer::SessionEvent},
    services::AppState,
};

/// SSE endpoint for session updates and countdown ticks
/// GET /api/v1/quiz/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = state.sessions.get(session_id).map_err(quiz_error)?;
    tracing::info!("Client connected to SSE stream: session={}", session_id);

    let stream = create_session_stream(handle.subscribe());
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// Current snapshot first, then one event per published change. Ends when
/// the session task goes away.
fn create_session_stream(
    receiver: watch::Receiver<SessionSnapshot>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (receiver, None::<SessionSnapshot>, ConnectionGuard::new()),
        |(mut receiver, previous, guard)| async move {
            if previous.is_some() && receiver.changed().await.is_err() {
                tracing::debug!("Session stream finished");
                return None;
            }

            let current = receiver.borrow_and_update().clone();
            let event = SessionEvent::between(previous.as_ref(), &current);
            let sse = Event::default()
                .event(event.event_name())
                .data(event.to_sse_data());

            Some((Ok(sse), (receiver, Some(current), guard)))
        },
    )
}
