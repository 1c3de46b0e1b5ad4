use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Resolved overlay session configuration. Field names stay camelCase
/// on disk so stored documents match the shape the web overlay and
/// its config backend historically used. Read-only for the lifetime
/// of one overlay session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    pub max_messages: usize,
    /// Seconds a message stays visible; 0 = never expire.
    pub message_duration: u64,
    pub show_badges: bool,
    pub font_size: u32,
    pub bg_opacity: f32,
    pub kick_channel: String,
    pub kick_chatroom_id: String,
    pub twitch_channel: String,
    pub twitch_token: String,
    /// Bind address for the local config API; empty disables it.
    pub api_bind: String,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_messages: 15,
            message_duration: 0,
            show_badges: true,
            font_size: 16,
            bg_opacity: 0.7,
            kick_channel: String::new(),
            kick_chatroom_id: String::new(),
            twitch_channel: String::new(),
            twitch_token: String::new(),
            api_bind: "127.0.0.1:8787".to_owned(),
            window_width: 420.0,
            window_height: 640.0,
        }
    }
}

impl OverlayConfig {
    pub fn load_or_create() -> Result<(Self, PathBuf)> {
        let config_dir = dirs::config_dir()
            .context("unable to locate OS config directory")?
            .join("multichat-overlay");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed creating config dir at {}", config_dir.display()))?;

        let config_path = config_dir.join("config.json");
        if !config_path.exists() {
            let default = Self::default();
            default.save(&config_path)?;
            return Ok((default, config_path));
        }

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed reading {}", config_path.display()))?;
        let config = serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", config_path.display()))?;
        Ok((config, config_path))
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed serializing config")?;
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }

    /// Clamps fields into their documented ranges.
    pub fn sanitized(mut self) -> Self {
        self.max_messages = self.max_messages.max(1);
        self.bg_opacity = self.bg_opacity.clamp(0.0, 1.0);
        self.font_size = self.font_size.max(1);
        self
    }

    /// The Kick adapter needs either a chatroom ID or a channel slug
    /// it can resolve one from. Absence is a no-op, not an error.
    pub fn kick_enabled(&self) -> bool {
        !self.kick_chatroom_id.trim().is_empty() || !self.kick_channel.trim().is_empty()
    }

    /// Twitch needs both a channel and a token.
    pub fn twitch_enabled(&self) -> bool {
        !self.twitch_channel.trim().is_empty() && !self.twitch_token.trim().is_empty()
    }
}
