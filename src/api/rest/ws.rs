use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tracing::{info, warn};

use crate::state::AppState;

/// Streams job offers to a connected driver client. The device-token push
/// transport proper is out of scope; this is the in-process stand-in.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.offer_events_tx.subscribe();

    info!("offer stream client connected");

    let send_task = tokio::spawn(async move {
        while let Ok(offer) = rx.recv().await {
            let json = match serde_json::to_string(&offer) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize offer for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("offer stream client disconnected");
}
