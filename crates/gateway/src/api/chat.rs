//! WebSocket chat endpoint — the primary interface for running requests.
//!
//! `GET /v1/chat/ws` upgrades to a long-lived connection that speaks the
//! `InboundFrame`/`OutboundFrame` protocol: the client must send an `auth`
//! frame first, within `transport.auth_timeout_secs`; every frame after
//! that is routed to the orchestrator until the connection goes idle for
//! `transport.idle_timeout_secs` or either side closes.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use orc_domain::{RequestContext, User};
use orc_protocol::{
    AuthResponsePayload, InboundFrame, OutboundFrame, UserInfo, AUTH_ERROR_CODE,
};

use crate::state::AppState;

/// GET /v1/chat/ws — upgrade to the chat WebSocket protocol.
pub async fn chat_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let permit = match state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            return (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                "too many open connections",
            )
                .into_response();
        }
    };

    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, state).await;
        drop(permit);
    })
    .into_response()
}

/// Constant-time token comparison via SHA-256 digest, so length differences
/// between candidate and expected tokens don't leak through timing.
fn token_eq(a: &str, b: &str) -> bool {
    let ha = Sha256::digest(a.as_bytes());
    let hb = Sha256::digest(b.as_bytes());
    ha.ct_eq(&hb).into()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let transport = &state.config.server.transport;

    let auth = match tokio::time::timeout(
        Duration::from_secs(transport.auth_timeout_secs),
        wait_for_auth(&mut sink, &mut stream, &state),
    )
    .await
    {
        Ok(Some(auth)) => auth,
        Ok(None) => return,
        Err(_) => {
            let _ = send_frame(
                &mut sink,
                &OutboundFrame::error(AUTH_ERROR_CODE, "auth frame not received in time"),
            )
            .await;
            return;
        }
    };

    tracing::info!(user_id = %auth.id, "chat connection authenticated");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(64);
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if send_frame(&mut sink, &frame).await.is_err() {
                break;
            }
        }
    });

    let cancel = CancellationToken::new();
    let idle_timeout = Duration::from_secs(transport.idle_timeout_secs);

    loop {
        let next = tokio::time::timeout(idle_timeout, stream.next()).await;
        let msg = match next {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                tracing::debug!(error = %e, "chat connection read error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(user_id = %auth.id, "chat connection idle timeout");
                break;
            }
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let frame: InboundFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = outbound_tx
                    .send(OutboundFrame::error("BAD_FRAME", e.to_string()))
                    .await;
                continue;
            }
        };

        match frame {
            InboundFrame::Auth { .. } => {
                let _ = outbound_tx
                    .send(OutboundFrame::error(AUTH_ERROR_CODE, "already authenticated"))
                    .await;
            }
            InboundFrame::Query {
                query,
                session_id,
                question_answer_uuid,
                locale,
                user_id,
                user_name,
                ..
            } => {
                let mut ctx = RequestContext::new(
                    User {
                        id: user_id,
                        username: user_name,
                        email: None,
                        permissions: Default::default(),
                        bearer_token: None,
                    },
                    session_id,
                    question_answer_uuid,
                );
                ctx.locale = locale;
                spawn_request(&state, ctx, query, outbound_tx.clone(), cancel.clone());
            }
            InboundFrame::HumanInput { payload } => {
                let ctx = RequestContext::new(auth.clone(), payload.session_id.clone(), uuid::Uuid::new_v4().to_string());
                spawn_resume(&state, ctx, InboundFrame::HumanInput { payload }, outbound_tx.clone(), cancel.clone());
            }
        }
    }

    cancel.cancel();
    drop(outbound_tx);
    writer.abort();
    tracing::info!(user_id = %auth.id, "chat connection closed");
}

async fn wait_for_auth(
    sink: &mut (impl SinkExt<Message> + Unpin),
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    state: &AppState,
) -> Option<User> {
    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => return None,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let frame: InboundFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(_) => {
                let _ = send_frame(sink, &OutboundFrame::error(AUTH_ERROR_CODE, "expected auth frame")).await;
                return None;
            }
        };

        let InboundFrame::Auth { token, language, .. } = frame else {
            let _ = send_frame(sink, &OutboundFrame::error(AUTH_ERROR_CODE, "auth frame must be sent first")).await;
            return None;
        };

        let accepted = match &state.api_token {
            Some(expected) => token_eq(&token, expected),
            None => true,
        };
        if !accepted {
            let _ = send_frame(
                sink,
                &OutboundFrame::AuthResponse { payload: AuthResponsePayload::error("invalid token") },
            )
            .await;
            return None;
        }

        if let Some(lang) = &language {
            tracing::debug!(language = %lang, "client requested locale override on connect");
        }
        let user_id = uuid::Uuid::new_v4().to_string();
        let user = User {
            id: user_id.clone(),
            username: user_id.clone(),
            email: None,
            permissions: Default::default(),
            bearer_token: Some(token),
        };

        let _ = send_frame(
            sink,
            &OutboundFrame::AuthResponse {
                payload: AuthResponsePayload::success(UserInfo {
                    user_id: user.id.clone(),
                    display_name: user.username.clone(),
                    email: None,
                    permissions: vec![],
                }),
            },
        )
        .await;

        let mut user = user;
        user.bearer_token = None;
        return Some(user);
    }
    None
}

fn spawn_request(
    state: &AppState,
    ctx: RequestContext,
    query: String,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
) {
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.handle_request(ctx, query, outbound.clone(), cancel).await {
            let _ = outbound.send(OutboundFrame::error("REQUEST_FAILED", e.to_string())).await;
        }
    });
}

fn spawn_resume(
    state: &AppState,
    ctx: RequestContext,
    inbound: InboundFrame,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
) {
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.resume_request(ctx, inbound, outbound.clone(), cancel).await {
            let _ = outbound.send(OutboundFrame::error("RESUME_FAILED", e.to_string())).await;
        }
    });
}

async fn send_frame(
    sink: &mut (impl SinkExt<Message> + Unpin),
    frame: &OutboundFrame,
) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_eq_matches_identical_tokens() {
        assert!(token_eq("secret-token", "secret-token"));
    }

    #[test]
    fn token_eq_rejects_mismatched_tokens() {
        assert!(!token_eq("secret-token", "wrong-token"));
    }

    #[test]
    fn token_eq_rejects_different_length_tokens() {
        assert!(!token_eq("short", "a-much-longer-candidate"));
    }
}
