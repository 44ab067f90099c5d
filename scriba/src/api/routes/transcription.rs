//! Transcription routes: session start and the progress event stream.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::Stream;

use crate::api::error::ApiResult;
use crate::api::models::{StartTranscriptionRequest, StartTranscriptionResponse};
use crate::api::server::AppState;
use crate::pipeline::{FileSpec, Subscription};

/// Create the transcription router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_transcription))
        .route("/progress/{session_id}", get(progress_stream))
}

/// Start transcription for a batch of files. Returns the session id whose
/// progress stream can then be subscribed to.
#[utoipa::path(
    post,
    path = "/api/transcription/start",
    tag = "transcription",
    request_body = StartTranscriptionRequest,
    responses(
        (status = 200, description = "Session started", body = StartTranscriptionResponse),
        (status = 400, description = "Missing credential", body = crate::api::error::ApiErrorResponse),
        (status = 404, description = "File not found", body = crate::api::error::ApiErrorResponse),
        (status = 422, description = "Empty batch", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn start_transcription(
    State(state): State<AppState>,
    Json(request): Json<StartTranscriptionRequest>,
) -> ApiResult<Json<StartTranscriptionResponse>> {
    let specs: Vec<FileSpec> = request
        .files
        .into_iter()
        .map(|f| FileSpec {
            path: f.path.into(),
            language: f.language,
        })
        .collect();

    let session_id = state.sessions.start(specs)?;
    Ok(Json(StartTranscriptionResponse { session_id }))
}

/// Serialize one pipeline event into an SSE frame.
fn sse_event(event: &crate::pipeline::PipelineEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.kind()).data(payload)
}

/// Drain a subscription into a lazy SSE stream.
///
/// The stream ends after the terminal `done` event, or when the producer
/// side closes. Client disconnects drop the subscription only; the pipeline
/// keeps running.
fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    futures::stream::unfold(Some(subscription), |state| async move {
        let mut subscription = state?;
        let event = subscription.recv().await?;
        let next = if event.is_terminal() {
            None
        } else {
            Some(subscription)
        };
        Some((Ok(sse_event(&event)), next))
    })
}

/// Live progress events for a session.
#[utoipa::path(
    get,
    path = "/api/transcription/progress/{session_id}",
    tag = "transcription",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "SSE stream of progress events"),
        (status = 404, description = "Session not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>> {
    let subscription = state.sessions.subscribe(&session_id)?;
    Ok(Sse::new(event_stream(subscription)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{EventLogLevel, PipelineEvent};
    use futures::StreamExt;

    #[test]
    fn test_sse_event_carries_type_and_payload() {
        let event = PipelineEvent::log(EventLogLevel::Info, "hello");
        // Data must round-trip as the JSON envelope including the type tag.
        let payload = serde_json::to_string(&event).unwrap();
        assert!(payload.contains("\"type\":\"log\""));
        assert!(payload.contains("hello"));
        let _ = sse_event(&event);
    }

    #[tokio::test]
    async fn test_event_stream_ends_after_done() {
        let (bus, publisher) =
            crate::pipeline::ProgressBus::new(8, std::time::Duration::from_secs(30));
        publisher
            .publish(PipelineEvent::Progress { steps: 1 })
            .await;
        publisher.publish(PipelineEvent::Done).await;

        let stream = event_stream(bus.subscribe());
        let frames: Vec<_> = stream.collect().await;
        assert_eq!(frames.len(), 2);
    }
}
