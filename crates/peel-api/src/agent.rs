//! Agent endpoint: server-sent events for long-running peels.
//!
//! Each event is a tagged variant (`progress`, `result`, `error`) written to
//! a channel; axum turns the channel into an SSE stream.

use crate::state::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use peel_pipeline::peel;
use peel_types::PeelRequest;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AgentEvent {
    Progress { stage: String, detail: String },
    Result { result: Box<peel_types::PeelResult> },
    Error { code: String, message: String },
}

/// `POST /v1/agent` — run a peel, streaming progress as SSE.
pub async fn agent(
    State(state): State<AppState>,
    Json(request): Json<PeelRequest>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::channel::<AgentEvent>(16);

    tokio::spawn(async move {
        let _ = tx
            .send(AgentEvent::Progress {
                stage: "fetch".to_string(),
                detail: request.url.clone(),
            })
            .await;

        match peel(&state.services, &request).await {
            Ok(result) => {
                let _ = tx
                    .send(AgentEvent::Progress {
                        stage: "done".to_string(),
                        detail: format!("{} tokens via {}", result.tokens, result.method),
                    })
                    .await;
                let _ = tx
                    .send(AgentEvent::Result {
                        result: Box::new(result),
                    })
                    .await;
            }
            Err(error) => {
                debug!(error = %error, "agent peel failed");
                let _ = tx
                    .send(AgentEvent::Error {
                        code: error.machine_code().to_string(),
                        message: error.to_string(),
                    })
                    .await;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("serialization error")))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
