/// Source platform of a chat message. The badge lookup is fixed: the
/// overlay has exactly these two upstreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Kick,
    Twitch,
}

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Platform::Kick => "kick",
            Platform::Twitch => "twitch",
        }
    }

    pub fn badge_glyph(self) -> &'static str {
        match self {
            Platform::Kick => "K",
            Platform::Twitch => "T",
        }
    }

    /// Accent color as RGB, kept free of any UI crate so the schema
    /// stays renderer-agnostic. Kick green, Twitch purple.
    pub fn accent_rgb(self) -> (u8, u8, u8) {
        match self {
            Platform::Kick => (0x53, 0xFC, 0x18),
            Platform::Twitch => (0x91, 0x46, 0xFF),
        }
    }
}

/// Normalized chat message, produced by the adapters and consumed by
/// the display buffer. Transient: never persisted anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub platform: Platform,
    pub username: String,
    pub text: String,
}
