use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse,
    },
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::helpers::{bad_request, internal_error, ApiResult, MISSING_PARAMS};
use crate::api::ServerState;
use crate::error::RelayError;
use crate::pipeline::ChatRequest;
use crate::stream::FlushEvent;

/// Query string of `GET /agent/api/chat`.
#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    pub id: Option<String>,
    pub message: Option<String>,
}

impl ChatQuery {
    fn into_request(self) -> Option<ChatRequest> {
        match (self.id, self.message) {
            (Some(id), Some(message)) if !id.is_empty() && !message.is_empty() => {
                Some(ChatRequest::new(id, message))
            }
            _ => None,
        }
    }
}

pub async fn handle_chat(
    State(state): State<ServerState>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = query
        .into_request()
        .ok_or_else(|| bad_request(MISSING_PARAMS))?;
    let request_id = Uuid::new_v4();
    log::info!(
        "[{request_id}] chat on conversation {}: {} chars",
        request.conversation_id,
        request.query.chars().count()
    );

    let response = state
        .pipeline
        .stream(request, state.shutdown.child_token())
        .await
        .map_err(|err| {
            log::warn!("[{request_id}] dispatch failed: {err}");
            match err {
                RelayError::InvalidRequest(_) => bad_request(MISSING_PARAMS),
                other => internal_error(other.to_string()),
            }
        })?;

    let (events, run) = response.into_parts();
    tokio::spawn(async move {
        let conversation_id = run.conversation_id().to_string();
        let state = run.finish().await;
        log::info!("[{request_id}] conversation {conversation_id} finished: {state}");
    });

    Ok(Sse::new(sse_events(events)).keep_alive(KeepAlive::default()))
}

fn sse_events(
    events: mpsc::Receiver<FlushEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok(to_sse(event)), events))
    })
}

fn to_sse(event: FlushEvent) -> Event {
    match event {
        FlushEvent::Text(text) => Event::default().data(strip_cr(text)),
        FlushEvent::End => Event::default().event("done").data("[DONE]"),
        FlushEvent::Error(message) => Event::default().event("error").data(strip_cr(message)),
    }
}

// SSE fields may not carry carriage returns; newlines become extra data lines.
fn strip_cr(text: String) -> String {
    if text.contains('\r') {
        text.replace('\r', "")
    } else {
        text
    }
}

pub async fn redirect_to_agent() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/agent")])
}

pub async fn agent_page() -> Html<&'static str> {
    Html(AGENT_PAGE)
}

const AGENT_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>llm-relay</title></head>
<body>
<pre id="log"></pre>
<form id="chat"><input id="message" autofocus><button>Send</button></form>
<script>
const id = crypto.randomUUID();
const log = document.getElementById("log");
document.getElementById("chat").onsubmit = (e) => {
  e.preventDefault();
  const input = document.getElementById("message");
  log.textContent += "\n> " + input.value + "\n";
  const source = new EventSource(
    "/agent/api/chat?id=" + id + "&message=" + encodeURIComponent(input.value));
  input.value = "";
  source.onmessage = (ev) => { log.textContent += ev.data; };
  source.addEventListener("done", () => source.close());
  source.addEventListener("error", (ev) => {
    if (ev.data) log.textContent += "\n[error] " + ev.data;
    source.close();
  });
};
</script>
</body>
</html>
"#;
