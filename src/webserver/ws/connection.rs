/// WebSocket connection lifecycle
///
/// Binds an upgraded socket to its hub: registers the client, spawns the
/// write pump, and runs the read pump in the calling task with the
/// hub-specific inbound policy. On any read error or close the client is
/// unregistered, which closes its send queue and lets the write pump
/// finish with a close frame.
use futures::StreamExt;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::models::WebSocketMessage;

use super::client;
use super::hub::{ClientStats, EventContent, Hub, HubType};

/// Handle one upgraded WebSocket connection to completion
pub async fn handle_connection(
    socket: WebSocket,
    hub: Arc<Hub>,
    authenticated: bool,
    metadata: HashMap<String, String>,
    remote_addr: String,
    user_agent: String,
) {
    let stats = ClientStats::new(remote_addr, user_agent);
    let (client_id, queue) = hub
        .register_client(authenticated, metadata, stats.clone())
        .await;

    let (ws_tx, mut ws_rx) = socket.split();
    tokio::spawn(client::write_pump(
        ws_tx,
        queue,
        stats.clone(),
        client_id.clone(),
    ));

    // Read pump
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let msg = WebSocketMessage::parse(&text);

                // Application-level ping is answered directly and never
                // reaches the hub handler
                if msg.message_type == "ping" {
                    stats.record_activity();
                    hub.send_to_client(
                        &client_id,
                        "pong",
                        json!({"timestamp": Utc::now().timestamp()}),
                    )
                    .await;
                    continue;
                }

                stats.record_received();
                hub.log_inbound(&msg, &client_id).await;
                dispatch_message(&hub, &client_id, authenticated, msg).await;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Protocol-level ping/pong is answered by the websocket
                // layer during the read; only activity is recorded here
                stats.record_activity();
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                logger::debug(
                    LogTag::Websocket,
                    &format!("Read error for client {}: {}", client_id, e),
                );
                break;
            }
        }
    }

    hub.unregister_client(&client_id).await;
}

/// Hub-specific inbound message policy
///
/// - client-control: authenticated `refresh`/`redirect` fan out to every
///   client on the hub; unauthenticated senders get an error reply
/// - everything else (all hubs): echoed back to the sender
async fn dispatch_message(
    hub: &Arc<Hub>,
    client_id: &str,
    authenticated: bool,
    msg: WebSocketMessage,
) {
    match hub.hub_type() {
        HubType::ClientControl
            if msg.message_type == "refresh" || msg.message_type == "redirect" =>
        {
            if authenticated {
                hub.broadcast_event(&msg.message_type, EventContent::Json(msg.content))
                    .await;
            } else {
                hub.send_to_client(
                    client_id,
                    "error",
                    json!({"message": "Authentication required"}),
                )
                .await;
            }
        }
        _ => {
            hub.send_to_client(client_id, "echo", msg.content).await;
        }
    }
}
