use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use rollcall_events::{Outbound, ViewerScope};
use tokio::sync::mpsc;

use super::messages::{ClientMessage, ServerReply, CONNECTED_MESSAGE};
use crate::error::{AppError, AppResult, INVALID_DISPLAY_TOKEN_MESSAGE};
use crate::handlers::public_display::{load_snapshot, resolve_display_token};
use crate::middleware::rbac::RequireAuth;
use crate::query::ClassScopeParams;
use crate::state::AppState;

/// Direct replies waiting for the socket, per viewer.
const REPLY_QUEUE: usize = 8;

/// How long a closing viewer gets to flush its last frames.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Who is on the other end of the socket.
enum ViewerKind {
    Dashboard,
    /// Public screen holding this display token.
    Display { token: String },
}

/// GET /api/v1/realtime/ws
///
/// Staff dashboard stream, optionally narrowed with `?class_id=`. Browsers
/// pass the JWT as `?access_token=`.
pub async fn dashboard_ws(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(scope): Query<ClassScopeParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let scope = ViewerScope::dashboard(user.tenant_id, scope.class_id);
    ws.on_upgrade(move |socket| pump_viewer(socket, state, scope, ViewerKind::Dashboard))
}

/// GET /api/v1/public/display/{token}/ws
///
/// The token is validated before the upgrade; a refused token gets the
/// same 401 as the snapshot endpoint.
pub async fn public_display_ws(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let resolved = resolve_display_token(&state, &token).await?;
    let scope = ViewerScope::public(resolved.tenant_id);
    Ok(ws.on_upgrade(move |socket| {
        pump_viewer(socket, state, scope, ViewerKind::Display { token })
    }))
}

/// Run one viewer connection until either side closes.
///
/// The hub owns the viewer's broadcast queue. Direct replies to the
/// viewer's own requests go through a second, small queue; one task writes
/// both to the socket.
async fn pump_viewer(socket: WebSocket, state: AppState, scope: ViewerScope, kind: ViewerKind) {
    let tenant_id = scope.tenant_id;
    let hub = state.hub.clone();
    let viewer = match hub.register(scope) {
        Ok(viewer) => viewer,
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "Hub unavailable, closing viewer socket");
            let (mut sink, _) = socket.split();
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    let viewer_id = viewer.id;
    let mut rx = viewer.receiver;
    tracing::info!(viewer = %viewer_id, tenant_id, "Viewer connected");

    let (mut sink, mut stream) = socket.split();
    let (reply_tx, mut replies) = mpsc::channel::<Message>(REPLY_QUEUE);

    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(Outbound::Text(text)) => Message::Text(text.to_string().into()),
                    Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                    Some(Outbound::Close) => Message::Close(None),
                    None => break,
                },
                reply = replies.recv() => match reply {
                    Some(message) => message,
                    None => break,
                },
            };
            let last = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                tracing::debug!(viewer = %viewer_id, "Viewer sink closed");
                break;
            }
            if last {
                break;
            }
        }
    });

    let _ = queue_reply(
        &reply_tx,
        &ServerReply::Connected {
            message: CONNECTED_MESSAGE,
        },
    )
    .await;

    let mut closing = false;
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(viewer = %viewer_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                let Some(request) = ClientMessage::parse(text.as_str()) else {
                    continue;
                };
                match answer(&state, &kind, request).await {
                    Answer::Reply(reply) => {
                        if !queue_reply(&reply_tx, &reply).await {
                            break;
                        }
                    }
                    Answer::ReplyAndClose(reply) => {
                        tracing::info!(
                            viewer = %viewer_id,
                            tenant_id,
                            "Display token refused on refresh",
                        );
                        let _ = queue_reply(&reply_tx, &reply).await;
                        let _ = reply_tx.send(Message::Close(None)).await;
                        closing = true;
                        break;
                    }
                    Answer::Ignore => {}
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(viewer = %viewer_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    hub.unregister(viewer_id);
    if closing {
        let _ = tokio::time::timeout(CLOSE_GRACE, &mut send_task).await;
    }
    send_task.abort();
    tracing::info!(viewer = %viewer_id, tenant_id, "Viewer disconnected");
}

enum Answer {
    Reply(ServerReply),
    ReplyAndClose(ServerReply),
    Ignore,
}

async fn answer(state: &AppState, kind: &ViewerKind, request: ClientMessage) -> Answer {
    match (request, kind) {
        (ClientMessage::Ping, _) => Answer::Reply(ServerReply::Pong {
            timestamp: chrono::Utc::now().timestamp(),
        }),
        (ClientMessage::Refresh, ViewerKind::Display { token }) => {
            match load_snapshot(state, token).await {
                Ok(data) => Answer::Reply(ServerReply::RefreshData { data }),
                Err(AppError::InvalidDisplayToken) => Answer::ReplyAndClose(ServerReply::Error {
                    code: "INVALID_TOKEN",
                    message: INVALID_DISPLAY_TOKEN_MESSAGE.to_string(),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Display refresh failed");
                    Answer::Reply(ServerReply::Error {
                        code: "REFRESH_FAILED",
                        message: "Could not load display data".to_string(),
                    })
                }
            }
        }
        (ClientMessage::Refresh, ViewerKind::Dashboard) => Answer::Ignore,
    }
}

/// Queue a reply for the socket. `false` once the writer has gone.
async fn queue_reply(replies: &mpsc::Sender<Message>, reply: &ServerReply) -> bool {
    match reply.to_json() {
        Some(json) => replies.send(Message::Text(json.into())).await.is_ok(),
        None => true,
    }
}
