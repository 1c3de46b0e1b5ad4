mod app;
mod config;
mod events;
mod feed;
mod kick;
mod normalize;
mod server;
mod store;
mod supervisor;
mod twitch;

use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    app::OverlayApp,
    config::OverlayConfig,
    events::ChatEvent,
    kick::{spawn_kick_worker, KickWorkerConfig},
    store::ConfigStore,
    twitch::{spawn_twitch_worker, TwitchWorkerConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, config_path) = resolve_config()?;
    info!(path = %config_path.display(), "loaded overlay config");

    let (tx, rx) = crossbeam_channel::unbounded::<ChatEvent>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_workers(&config, &tx, &shutdown_rx);

    let viewport = egui::ViewportBuilder::default()
        .with_transparent(true)
        .with_decorations(false)
        .with_always_on_top()
        .with_mouse_passthrough(true)
        .with_inner_size([config.window_width.max(120.0), config.window_height.max(120.0)])
        .with_title("Multichat Overlay");
    let native_options = eframe::NativeOptions {
        viewport,
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    eframe::run_native(
        "Multichat Overlay",
        native_options,
        Box::new(move |_cc| Ok(Box::new(OverlayApp::new(rx, config, shutdown_tx)))),
    )
    .map_err(|err| anyhow::anyhow!("failed starting overlay window: {err}"))?;

    Ok(())
}

/// Resolves the session config: a stored short ID passed as the first
/// CLI argument wins, otherwise config.json is loaded (and created on
/// first run). Empty credential fields are filled from the
/// environment or a `.env` fallback, then everything is clamped.
fn resolve_config() -> Result<(OverlayConfig, PathBuf)> {
    let (mut config, config_path) = match std::env::args().nth(1) {
        Some(id) => {
            let store = ConfigStore::open_default()?;
            let config = store
                .load(&id)?
                .with_context(|| format!("no stored overlay config with id {id}"))?;
            let path = store.path_for(&id)?;
            (config, path)
        }
        None => OverlayConfig::load_or_create()?,
    };

    let dotenv = load_dotenv_fallback();
    if config.twitch_token.trim().is_empty() {
        if let Some(value) = env_or_dotenv("TWITCH_TOKEN", &dotenv) {
            config.twitch_token = value;
        }
    }
    if config.twitch_channel.trim().is_empty() {
        if let Some(value) = env_or_dotenv("TWITCH_CHANNEL", &dotenv) {
            config.twitch_channel = value;
        }
    }
    if config.kick_chatroom_id.trim().is_empty() {
        if let Some(value) = env_or_dotenv("KICK_CHATROOM_ID", &dotenv) {
            config.kick_chatroom_id = value;
        }
    }
    if config.kick_channel.trim().is_empty() {
        if let Some(value) = env_or_dotenv("KICK_CHANNEL", &dotenv) {
            config.kick_channel = value;
        }
    }

    Ok((config.sanitized(), config_path))
}

/// Starts whichever adapters the config enables, plus the config API.
/// A platform with missing fields is simply never connected.
fn spawn_workers(
    config: &OverlayConfig,
    tx: &Sender<ChatEvent>,
    shutdown: &watch::Receiver<bool>,
) {
    if config.kick_enabled() {
        spawn_kick_worker(
            KickWorkerConfig {
                chatroom_id: config.kick_chatroom_id.clone(),
                channel: config.kick_channel.clone(),
            },
            tx.clone(),
            shutdown.clone(),
        );
    } else {
        info!("kick adapter disabled (no chatroom id or channel configured)");
    }

    if config.twitch_enabled() {
        spawn_twitch_worker(
            TwitchWorkerConfig {
                channel: config.twitch_channel.clone(),
                token: config.twitch_token.clone(),
            },
            tx.clone(),
            shutdown.clone(),
        );
    } else {
        info!("twitch adapter disabled (channel or token missing)");
    }

    let api_bind = config.api_bind.trim();
    if api_bind.is_empty() {
        info!("config api disabled (apiBind is empty)");
    } else if api_bind.parse::<SocketAddr>().is_err() {
        warn!(bind = %api_bind, "apiBind is invalid; config api disabled");
    } else {
        let bind = api_bind.to_owned();
        tokio::spawn(async move {
            let store = match ConfigStore::open_default() {
                Ok(store) => store,
                Err(err) => {
                    error!(?err, "failed opening config store; config api disabled");
                    return;
                }
            };
            if let Err(err) = server::run_api_server(&bind, store).await {
                error!(?err, bind = %bind, "config api crashed");
            }
        });
    }
}

fn env_or_dotenv(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| dotenv.get(key).cloned())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn load_dotenv_fallback() -> HashMap<String, String> {
    for path in dotenv_candidate_paths() {
        if !path.is_file() {
            continue;
        }
        match parse_dotenv_file(&path) {
            Ok(values) => {
                info!(path = %path.display(), entries = values.len(), "loaded .env fallback");
                return values;
            }
            Err(err) => {
                warn!(?err, path = %path.display(), "failed parsing .env fallback file");
            }
        }
    }
    HashMap::new()
}

fn dotenv_candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            paths.push(exe_dir.join(".env"));
        }
    }
    paths
}

fn parse_dotenv_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    let text =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'').to_owned();
        out.insert(key.to_owned(), value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf, time::SystemTime};

    use super::parse_dotenv_file;

    #[test]
    fn parse_dotenv_supports_comments_export_and_quotes() {
        let unique = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("clock should be valid")
            .as_nanos();
        let path: PathBuf = std::env::temp_dir().join(format!("multichat_env_{unique}.env"));
        let body = r#"
# comment
export TWITCH_TOKEN=oauth:abc123
KICK_CHATROOM_ID="12345"
EMPTY=
"#;
        fs::write(&path, body).expect("should write temp env file");
        let parsed = parse_dotenv_file(&path).expect("should parse dotenv");
        fs::remove_file(&path).ok();

        assert_eq!(
            parsed.get("TWITCH_TOKEN").map(String::as_str),
            Some("oauth:abc123")
        );
        assert_eq!(
            parsed.get("KICK_CHATROOM_ID").map(String::as_str),
            Some("12345")
        );
        assert_eq!(parsed.get("EMPTY").map(String::as_str), Some(""));
    }
}
