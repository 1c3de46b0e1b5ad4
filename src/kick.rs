use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::{
    events::{ChatEvent, Platform},
    normalize,
    supervisor::supervise,
};

/// Pusher application protocol v7 endpoint Kick chat rides on.
const PUSHER_WS_URL: &str =
    "wss://ws-us2.pusher.com/app/32cbd69e4b950bf97679?protocol=7&client=js&version=8.4.0-rc2&flash=false";
const CONNECTION_ESTABLISHED_EVENT: &str = "pusher:connection_established";
const CHAT_MESSAGE_EVENT: &str = "App\\Events\\ChatMessageEvent";
const KICK_CHANNEL_API: &str = "https://kick.com/api/v2/channels";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct KickWorkerConfig {
    /// Chatroom ID, if already known. Takes precedence over `channel`.
    pub chatroom_id: String,
    /// Channel slug, resolved to a chatroom ID at connect time.
    pub channel: String,
}

pub fn subscribe_payload(chatroom_id: &str) -> String {
    json!({
        "event": "pusher:subscribe",
        "data": { "channel": format!("chatrooms.{chatroom_id}.v2") }
    })
    .to_string()
}

pub fn spawn_kick_worker(
    config: KickWorkerConfig,
    tx: Sender<ChatEvent>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        supervise(Platform::Kick, shutdown, move || {
            open_kick_session(config.clone(), tx.clone())
        })
        .await;
    })
}

/// Fetches Kick's channel metadata for a slug. Also backs the local
/// proxy endpoint that lets browser consumers dodge CORS.
pub async fn fetch_channel(client: &reqwest::Client, slug: &str) -> Result<Value> {
    let body = client
        .get(format!("{KICK_CHANNEL_API}/{slug}"))
        .send()
        .await
        .with_context(|| format!("kick channel request failed for {slug}"))?
        .error_for_status()
        .with_context(|| format!("kick channel lookup rejected for {slug}"))?
        .json::<Value>()
        .await
        .context("kick channel response was not json")?;
    Ok(body)
}

pub fn chatroom_id_from_channel(body: &Value) -> Option<String> {
    match body.pointer("/chatroom/id") {
        Some(Value::Number(id)) => Some(id.to_string()),
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        // Kick's edge rejects clients without a browser-ish UA.
        .user_agent("Mozilla/5.0 (X11; Linux x86_64) multichat-overlay")
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed building http client")
}

async fn resolve_chatroom_id(config: &KickWorkerConfig) -> Result<String> {
    let trimmed = config.chatroom_id.trim();
    if !trimmed.is_empty() {
        return Ok(trimmed.to_owned());
    }
    let client = http_client()?;
    let body = fetch_channel(&client, config.channel.trim()).await?;
    chatroom_id_from_channel(&body)
        .with_context(|| format!("kick channel {} has no chatroom id", config.channel))
}

/// Handshake phase: resolve the chatroom and open the socket. A
/// failure here counts as a failed attempt and goes through the
/// supervisor's normal fixed-delay retry.
async fn open_kick_session(
    config: KickWorkerConfig,
    tx: Sender<ChatEvent>,
) -> Result<impl Future<Output = Result<()>>> {
    let chatroom_id = resolve_chatroom_id(&config).await?;
    let (socket, _response) = connect_async(PUSHER_WS_URL)
        .await
        .context("kick pusher connect failed")?;
    info!(chatroom = %chatroom_id, "connected to kick pusher stream");
    Ok(drive_kick_session(socket, chatroom_id, tx))
}

async fn drive_kick_session(
    mut socket: WsStream,
    chatroom_id: String,
    tx: Sender<ChatEvent>,
) -> Result<()> {
    while let Some(next) = socket.next().await {
        let text = match next {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => return Err(err).context("kick stream read error"),
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        match frame.get("event").and_then(Value::as_str) {
            Some(CONNECTION_ESTABLISHED_EVENT) => {
                socket
                    .send(Message::Text(subscribe_payload(&chatroom_id)))
                    .await
                    .context("failed sending kick subscribe payload")?;
                info!(chatroom = %chatroom_id, "subscribed to kick chatroom");
            }
            Some(CHAT_MESSAGE_EVENT) => {
                let Some(payload) = chat_payload(&frame) else {
                    continue;
                };
                let event = normalize::kick_chat_event(&payload);
                if tx.send(event).is_err() {
                    warn!("overlay receiver dropped; stopping kick worker");
                    return Ok(());
                }
            }
            // All other pusher control frames are protocol noise.
            _ => {}
        }
    }
    Ok(())
}

/// Pusher delivers the chat payload as a JSON-encoded string in the
/// `data` field; a bare object is tolerated too.
fn chat_payload(frame: &Value) -> Option<Value> {
    match frame.get("data") {
        Some(Value::String(raw)) => serde_json::from_str(raw).ok(),
        Some(object @ Value::Object(_)) => Some(object.clone()),
        _ => None,
    }
}
