/// Per-connection read/write pumps
///
/// Each WebSocket connection owns two tasks: the write pump drains the
/// client's bounded queue into coalesced text frames and emits periodic
/// heartbeats; the read pump (driven from `connection`) parses inbound
/// frames. Any error on either side tears down only that connection.
use futures::stream::SplitSink;
use futures::SinkExt;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};

use crate::logger::{self, LogTag};
use crate::models::WebSocketMessage;

use super::hub::ClientStats;

/// Time allowed to write a frame to the peer
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Heartbeat message period
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// Maximum inbound frame size (512 KiB)
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// Outbound queue capacity per client
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Drain the outbound queue into the socket
///
/// Each dequeue coalesces everything else currently queued into the same
/// text frame, newline-separated, so a waking writer catches up in one
/// syscall. A closed queue (the hub evicted or unregistered the client)
/// writes a close frame and exits.
pub async fn write_pump(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<WebSocketMessage>,
    stats: Arc<ClientStats>,
    client_id: String,
) {
    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_PERIOD, HEARTBEAT_PERIOD);

    loop {
        tokio::select! {
            maybe = queue.recv() => {
                match maybe {
                    Some(msg) => {
                        let mut payload = match msg.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                logger::error(
                                    LogTag::Websocket,
                                    &format!("Failed to serialize message for {}: {}", client_id, e),
                                );
                                continue;
                            }
                        };
                        let mut written = 1u64;

                        // Append everything queued right now to this frame
                        let queued = queue.len();
                        for _ in 0..queued {
                            match queue.try_recv() {
                                Ok(next) => match next.to_json() {
                                    Ok(json) => {
                                        payload.push('\n');
                                        payload.push_str(&json);
                                        written += 1;
                                    }
                                    Err(e) => logger::error(
                                        LogTag::Websocket,
                                        &format!("Failed to serialize message for {}: {}", client_id, e),
                                    ),
                                },
                                Err(_) => break,
                            }
                        }

                        match timeout(WRITE_DEADLINE, ws_tx.send(Message::Text(payload))).await {
                            Ok(Ok(())) => {
                                stats.messages_sent.fetch_add(written, Ordering::Relaxed);
                            }
                            Ok(Err(e)) => {
                                logger::debug(
                                    LogTag::Websocket,
                                    &format!("Write failed for client {}: {}", client_id, e),
                                );
                                return;
                            }
                            Err(_) => {
                                logger::warning(
                                    LogTag::Websocket,
                                    &format!("Write deadline exceeded for client {}", client_id),
                                );
                                return;
                            }
                        }
                    }
                    None => {
                        // The hub closed the queue
                        let _ = timeout(WRITE_DEADLINE, ws_tx.send(Message::Close(None))).await;
                        return;
                    }
                }
            }
            _ = heartbeat.tick() => {
                let msg = WebSocketMessage::event(
                    "heartbeat",
                    json!({"timestamp": Utc::now().timestamp()}),
                );
                let payload = match msg.to_json() {
                    Ok(json) => json,
                    Err(_) => continue,
                };

                match timeout(WRITE_DEADLINE, ws_tx.send(Message::Text(payload))).await {
                    Ok(Ok(())) => {
                        stats.last_heartbeat.store(Utc::now().timestamp(), Ordering::Relaxed);
                    }
                    _ => {
                        logger::debug(
                            LogTag::Websocket,
                            &format!("Heartbeat write failed for client {}", client_id),
                        );
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_contract_constants() {
        assert_eq!(WRITE_DEADLINE, Duration::from_secs(10));
        assert_eq!(HEARTBEAT_PERIOD, Duration::from_secs(30));
        assert_eq!(MAX_MESSAGE_SIZE, 512 * 1024);
        assert_eq!(SEND_QUEUE_CAPACITY, 256);
    }
}
