use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use scholarship_core::error::CoreError;
use scholarship_core::messages::{WS_PING, WS_PONG};

use crate::auth::jwt::{validate_token, Claims};
use crate::error::AppError;
use crate::state::AppState;
use crate::ws::manager::{text_message, WsManager};

/// Query string for `GET /api/v1/ws`. Browsers cannot set headers on a
/// WebSocket upgrade, so the access token travels here.
#[derive(Debug, Deserialize)]
pub struct WsAuthParams {
    pub token: Option<String>,
}

/// Authenticate, then upgrade the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// served by a sender task plus the receive loop below.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsAuthParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let token = params.token.ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized("Missing token query parameter".into()))
    })?;
    let claims = validate_token(&token, &state.config.jwt)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid or expired token".into())))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, claims)))
}

async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, claims: Claims) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = claims.sub, role = %claims.role, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone(), claims.sub, claims.role).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                if is_app_ping(text.as_str()) {
                    if let Some(pong) = text_message(&json!({ "type": WS_PONG })) {
                        ws_manager.send_to_connection(&conn_id, pong).await;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = claims.sub, "WebSocket disconnected");
}

/// Clients that cannot see protocol pings send `{"type":"ping"}`.
fn is_app_ping(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v["type"] == WS_PING)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_application_ping() {
        assert!(is_app_ping(r#"{"type":"ping"}"#));
        assert!(!is_app_ping(r#"{"type":"subscribe"}"#));
        assert!(!is_app_ping("ping"));
    }
}
