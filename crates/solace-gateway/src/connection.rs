use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use solace_types::api::Claims;
use solace_types::events::{GatewayCommand, GatewayEvent, Topic};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Time a client has to send Identify after the upgrade.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Topics = Arc<RwLock<HashSet<Topic>>>;

/// Handle a single WebSocket connection: Identify handshake, Ready, then
/// forward subscribed changes until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    if send_event(&mut sender, &GatewayEvent::Ready { user_id }).await.is_err() {
        return;
    }

    let conn_id = dispatcher.register(user_id).await;
    info!(
        "{} connected to gateway ({}), {} live",
        user_id,
        conn_id,
        dispatcher.connection_count().await
    );

    run_connection_loop(sender, receiver, &dispatcher, user_id).await;

    dispatcher.unregister(conn_id).await;
    info!(
        "{} disconnected from gateway ({}), {} live",
        user_id,
        conn_id,
        dispatcher.connection_count().await
    );
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &Dispatcher,
    user_id: Uuid,
) {
    let mut change_rx = dispatcher.subscribe();

    // Per-connection topic set, shared between the send and recv tasks.
    let topics: Topics = Arc::new(RwLock::new(HashSet::new()));
    let send_topics = topics.clone();

    // Replies to client commands are written by the send task.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = change_rx.recv() => {
                    let change = match result {
                        Ok(change) => change,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Change receiver for {} lagged by {} events", user_id, n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if !send_topics.read().await.contains(&change.topic()) {
                        continue;
                    }
                    if !change.audience().includes(user_id) {
                        continue;
                    }

                    if send_event(&mut sender, &GatewayEvent::Change(change)).await.is_err() {
                        break;
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(reply) = reply else { break };
                    if send_event(&mut sender, &reply).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if let Some(reply) = handle_command(user_id, cmd, &topics).await {
                            if reply_tx.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn handle_command(user_id: Uuid, cmd: GatewayCommand, topics: &Topics) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Identify { .. } => None, // Already handled

        GatewayCommand::Subscribe { topics: added } => {
            debug!("{} subscribing to {:?}", user_id, added);
            let mut current = topics.write().await;
            current.extend(added);
            Some(GatewayEvent::Subscribed {
                topics: current.iter().copied().collect(),
            })
        }

        GatewayCommand::Unsubscribe { topics: removed } => {
            debug!("{} unsubscribing from {:?}", user_id, removed);
            let mut current = topics.write().await;
            for topic in &removed {
                current.remove(topic);
            }
            Some(GatewayEvent::Subscribed {
                topics: current.iter().copied().collect(),
            })
        }
    }
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<Uuid> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
