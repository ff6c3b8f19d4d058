use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::services::ingest::{self, PgIngestStore};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// One dashboard/device connection. Outbound traffic (acks to this sender
/// plus fan-out frames) is funneled through a single writer task; the
/// broadcast subscription lives exactly as long as the connection.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut fanout_rx = state.broadcaster.subscribe();
    let fanout_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match fanout_rx.recv().await {
                Ok(frame) => {
                    if fanout_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "slow dashboard client; dropping frames");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let store = PgIngestStore::new(state.db.clone());
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, "websocket receive failed");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                let reply = ingest::process_frame(
                    &store,
                    &state.alert_dedup,
                    &state.broadcaster,
                    text.as_str(),
                    Utc::now(),
                )
                .await;
                if out_tx.send(reply.to_frame()).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // binary and ping/pong frames are ignored
            _ => {}
        }
    }

    forwarder.abort();
    drop(out_tx);
    writer.abort();
}
