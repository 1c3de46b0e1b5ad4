use std::future::Future;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::{
    events::{ChatEvent, Platform},
    normalize,
    supervisor::supervise,
};

const TWITCH_IRC_WS_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct TwitchWorkerConfig {
    pub channel: String,
    pub token: String,
}

/// Login sequence sent immediately after the socket opens, in order:
/// PASS, NICK, JOIN. The token gets an `oauth:` prefix if it lacks
/// one; the channel is lowercased with any leading `#` stripped.
pub fn login_lines(channel: &str, token: &str) -> Vec<String> {
    let channel = channel.trim().trim_start_matches('#').to_ascii_lowercase();
    let token = token.trim();
    let token = if token.starts_with("oauth:") {
        token.to_owned()
    } else {
        format!("oauth:{token}")
    };
    vec![
        format!("PASS {token}"),
        format!("NICK {channel}"),
        format!("JOIN #{channel}"),
    ]
}

pub fn spawn_twitch_worker(
    config: TwitchWorkerConfig,
    tx: Sender<ChatEvent>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        supervise(Platform::Twitch, shutdown, move || {
            open_twitch_session(config.clone(), tx.clone())
        })
        .await;
    })
}

async fn open_twitch_session(
    config: TwitchWorkerConfig,
    tx: Sender<ChatEvent>,
) -> Result<impl Future<Output = Result<()>>> {
    let (mut socket, _response) = connect_async(TWITCH_IRC_WS_URL)
        .await
        .context("twitch irc connect failed")?;
    for line in login_lines(&config.channel, &config.token) {
        socket
            .send(Message::Text(line))
            .await
            .context("twitch login write failed")?;
    }
    info!(channel = %config.channel, "connected to twitch irc");
    Ok(drive_twitch_session(socket, tx))
}

async fn drive_twitch_session(mut socket: WsStream, tx: Sender<ChatEvent>) -> Result<()> {
    while let Some(next) = socket.next().await {
        let text = match next {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => return Err(err).context("twitch stream read error"),
        };
        // One frame may carry several CRLF-separated IRC lines.
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.starts_with("PING") {
                // Keepalive, not user content.
                socket
                    .send(Message::Text("PONG :tmi.twitch.tv".to_owned()))
                    .await
                    .context("twitch pong write failed")?;
                continue;
            }
            if let Some(event) = normalize::twitch_privmsg_event(line) {
                if tx.send(event).is_err() {
                    warn!("overlay receiver dropped; stopping twitch worker");
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::login_lines;

    #[test]
    fn login_lines_are_pass_nick_join_in_order() {
        let lines = login_lines("SomeChannel", "abc123");
        assert_eq!(
            lines,
            vec![
                "PASS oauth:abc123".to_owned(),
                "NICK somechannel".to_owned(),
                "JOIN #somechannel".to_owned(),
            ]
        );
    }

    #[test]
    fn token_keeps_existing_oauth_prefix() {
        let lines = login_lines("chan", "oauth:xyz");
        assert_eq!(lines[0], "PASS oauth:xyz");
    }

    #[test]
    fn channel_hash_prefix_is_not_doubled() {
        let lines = login_lines("#Chan", "t");
        assert_eq!(lines[1], "NICK chan");
        assert_eq!(lines[2], "JOIN #chan");
    }
}
