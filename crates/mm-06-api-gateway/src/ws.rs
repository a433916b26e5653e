//! WebSocket connection handler.
//!
//! The socket is split: a writer task drains the connection's outbound
//! queue, the read loop feeds control frames to the hub. Closing either side
//! deregisters the connection.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::ConnectionId;
use crate::hub::BroadcastHub;

/// Serve one upgraded socket until the client goes away.
pub async fn handle_socket(hub: Arc<BroadcastHub>, socket: WebSocket) {
    let (id, mut outbound) = hub.connect();
    info!(connection_id = %id, "New WebSocket connection");

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(&hub, &id, &text).await,
            Ok(Message::Binary(data)) => {
                if let Ok(text) = String::from_utf8(data) {
                    handle_text(&hub, &id, &text).await;
                }
            }
            // Pings are answered by the protocol layer
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(connection_id = %id, "WebSocket close received");
                break;
            }
            Err(e) => {
                warn!(connection_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    hub.disconnect(&id);
    writer.abort();
    info!(connection_id = %id, "WebSocket connection closed");
}

async fn handle_text(hub: &BroadcastHub, id: &ConnectionId, text: &str) {
    if let Err(e) = hub.handle_client_message(id, text).await {
        debug!(connection_id = %id, error = %e, "Control frame ignored");
    }
}
