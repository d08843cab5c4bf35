//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{Channel, ExplorerEvent};
use crate::service::ExplorerStore;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards events on subscribed channels from the [`broadcast::Receiver`].
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<ExplorerEvent>,
    store: ExplorerStore,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &store).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(json) = event_frame(&event, &subs)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Serializes `event` as an event envelope if the client subscribed to its channel.
fn event_frame(event: &ExplorerEvent, subs: &SubscriptionManager) -> Option<String> {
    let channel = event.channel();
    if !subs.matches(channel) {
        return None;
    }
    let payload = serde_json::to_value(event).ok()?;
    let mut msg = WsMessage::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload);
    if let Some(obj) = msg.payload.as_object_mut() {
        obj.insert("channel".to_owned(), serde_json::json!(channel.to_string()));
    }
    msg.to_json()
}

/// Splits channel names into known channels and a wildcard flag.
fn parse_channels(names: &[String]) -> (Vec<Channel>, bool) {
    let mut channels = Vec::new();
    let mut wildcard = false;
    for name in names {
        if name == "*" {
            wildcard = true;
        } else if let Some(channel) = Channel::parse(name) {
            channels.push(channel);
        }
    }
    (channels, wildcard)
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    store: &ExplorerStore,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON").to_json();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command").to_json();
    };

    let payload = match command {
        WsCommand::Subscribe { channels } => {
            let (parsed, wildcard) = parse_channels(&channels);
            subs.subscribe(&parsed, wildcard);
            serde_json::json!({
                "subscribed": parsed.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "channels": subs.channels().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::Unsubscribe { channels } => {
            let (parsed, wildcard) = parse_channels(&channels);
            subs.unsubscribe(&parsed, wildcard);
            serde_json::json!({
                "unsubscribed": parsed.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "channels": subs.channels().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::GetStats => serde_json::to_value(store.stats().await).ok()?,
        WsCommand::GetLatestBlock => serde_json::to_value(store.latest_block().await).ok()?,
        WsCommand::Ping => serde_json::json!({ "pong": true }),
    };

    WsMessage::new(msg.id, WsMessageType::Response, payload).to_json()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Block;
    use crate::service::explorer_store::tests::facade;

    fn command(id: &str, payload: serde_json::Value) -> String {
        serde_json::json!({
            "id": id,
            "type": "command",
            "timestamp": "2024-01-01T00:00:00Z",
            "payload": payload,
        })
        .to_string()
    }

    fn parse(json: Option<String>) -> WsMessage {
        let Some(json) = json else {
            panic!("expected a response");
        };
        let Ok(msg) = serde_json::from_str::<WsMessage>(&json) else {
            panic!("response should be an envelope: {json}");
        };
        msg
    }

    #[tokio::test]
    async fn malformed_json_returns_error() {
        let (store, _) = facade();
        let mut subs = SubscriptionManager::new();
        let msg = parse(handle_text_message("{not json", &mut subs, &store).await);
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload.get("code"), Some(&serde_json::json!(400)));
    }

    #[tokio::test]
    async fn unknown_command_returns_404() {
        let (store, _) = facade();
        let mut subs = SubscriptionManager::new();
        let text = command("7", serde_json::json!({ "command": "swap" }));
        let msg = parse(handle_text_message(&text, &mut subs, &store).await);
        assert_eq!(msg.id, "7");
        assert_eq!(msg.payload.get("code"), Some(&serde_json::json!(404)));
    }

    #[tokio::test]
    async fn subscribe_then_filters_events() {
        let (store, _) = facade();
        let mut subs = SubscriptionManager::new();
        let text = command(
            "1",
            serde_json::json!({ "command": "subscribe", "channels": ["blocks", "bogus"] }),
        );
        let msg = parse(handle_text_message(&text, &mut subs, &store).await);
        assert_eq!(msg.msg_type, WsMessageType::Response);
        assert_eq!(msg.payload.get("subscribed"), Some(&serde_json::json!(["blocks"])));

        let block = ExplorerEvent::new_block(&Block::new(5, "0xb5", 1_700_000_000));
        let Some(frame) = event_frame(&block, &subs) else {
            panic!("block event should be forwarded");
        };
        assert!(frame.contains("\"channel\":\"blocks\""));

        let trade = ExplorerEvent::NewTrade {
            symbol: "BTC".to_owned(),
            price: 1.0,
            size: 1.0,
            side: crate::domain::TradeSide::Buy,
            timestamp: chrono::Utc::now(),
        };
        assert!(event_frame(&trade, &subs).is_none());
    }

    #[tokio::test]
    async fn get_latest_block_reads_store() {
        let (store, _) = facade();
        let Ok(_) = store.upsert_block(Block::new(9, "0xb9", 1_700_000_000)).await else {
            panic!("block should store");
        };
        let mut subs = SubscriptionManager::new();
        let text = command("2", serde_json::json!({ "command": "get_latest_block" }));
        let msg = parse(handle_text_message(&text, &mut subs, &store).await);
        assert_eq!(msg.payload.get("block_number"), Some(&serde_json::json!(9)));
    }
}
