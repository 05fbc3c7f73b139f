use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use gauntlet_bot::{Bot, ChatEvent};
use gauntlet_types::events::{BotCommand, BridgeFrame};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: the bot sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the bridge is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve one bridge connection: Identify handshake, then relay until either
/// side goes away.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    bot: Bot<Dispatcher>,
    bridge_token: Arc<str>,
) {
    let (mut sender, mut receiver) = socket.split();

    if !wait_for_identify(&mut receiver, &bridge_token).await {
        warn!("Bridge failed to identify, closing");
        return;
    }

    if !send_command(&mut sender, &BotCommand::Ready).await {
        return;
    }

    let (conn_id, mut outbound) = dispatcher.register_bridge().await;
    info!("Bridge {} connected", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Bot commands -> bridge, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                command = outbound.recv() => {
                    let Some(command) = command else { break };
                    if !send_command(&mut sender, &command).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(
                                "Heartbeat timeout (missed {} pongs), dropping bridge",
                                missed_heartbeats
                            );
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

    // Bridge frames -> bot
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<BridgeFrame>(&text) {
                    Ok(frame) => route_frame(&dispatcher_recv, &bot, frame).await,
                    Err(e) => {
                        warn!("Bad bridge frame: {} -- raw: {}", e, truncate(&text, 200));
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

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_bridge(conn_id).await;
    info!("Bridge {} disconnected", conn_id);
}

async fn route_frame(dispatcher: &Dispatcher, bot: &Bot<Dispatcher>, frame: BridgeFrame) {
    let event = match frame {
        BridgeFrame::Identify { .. } => return, // Already handled
        BridgeFrame::MessageSent { request_id, message_id } => {
            dispatcher.resolve(request_id, Ok(message_id)).await;
            return;
        }
        BridgeFrame::CommandFailed { request_id, reason } => {
            warn!("Bridge refused request {}: {}", request_id, reason);
            dispatcher.resolve(request_id, Err(reason)).await;
            return;
        }
        BridgeFrame::MessageCreate(msg) => ChatEvent::Message(msg),
        BridgeFrame::ReactionAdd(reaction) => ChatEvent::ReactionAdd(reaction),
        BridgeFrame::ReactionRemove(reaction) => ChatEvent::ReactionRemove(reaction),
    };

    // Each event is its own unit of work; the read loop must keep draining
    // frames so send_message confirmations are not starved.
    let bot = bot.clone();
    tokio::spawn(async move { bot.handle_event(event).await });
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, expected: &str) -> bool {
    let identify = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(BridgeFrame::Identify { token }) = serde_json::from_str(&text) {
                    return tokens_match(&token, expected);
                }
                debug!("Ignoring frame before Identify");
            }
        }
        false
    });

    identify.await.unwrap_or(false)
}

async fn send_command(sender: &mut SplitSink<WebSocket, Message>, command: &BotCommand) -> bool {
    let text = match serde_json::to_string(command) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode {:?}: {}", command, e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3creT"));
        assert!(!tokens_match("s3cret", "s3cret!"));
        assert!(!tokens_match("", "s3cret"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("🟦🟨🟥", 2), "🟦🟨");
        assert_eq!(truncate("short", 200), "short");
    }
}
