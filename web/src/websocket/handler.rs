use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use cable::BroadcastHub;
use futures::{SinkExt, StreamExt};
use log::*;
use service::AppState;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::CABLE_PROTOCOL;

/// Upgrade to an Action Cable connection registered with the hub.
pub(crate) async fn cable_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> Response {
    ws.protocols([CABLE_PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, app_state.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // The welcome frame is queued here, before either task starts
    let connection_id = hub.connect(tx);
    debug!("Cable connection {connection_id} opened");

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_hub = Arc::clone(&hub);
    let reader_id = connection_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Text(text) => {
                    if let Err(e) = reader_hub.handle_message(&reader_id, text.as_str()) {
                        warn!("Cable connection {reader_id} sent a bad command: {e}");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.cleanup(&connection_id);
    debug!("Cable connection {connection_id} closed");
}

/// Send `{type: "ping"}` with the current unix time to every connection
/// each `interval`. Intervals under a second are raised to one second.
pub fn start_heartbeat_task(hub: Arc<BroadcastHub>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reached = hub.ping_all(chrono::Utc::now().timestamp());
            trace!("Heartbeat reached {reached} cable connections");
        }
    })
}
