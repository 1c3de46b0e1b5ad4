use serde_json::Value;

use crate::events::{ChatEvent, Platform};

/// Neutralizes markup-significant characters in message text so chat
/// content can never be interpreted as markup by whatever renders it.
/// This is the only sanitization performed.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Maps a decoded Kick `ChatMessageEvent` payload to the normalized
/// schema. Missing fields get defaults rather than errors.
pub fn kick_chat_event(payload: &Value) -> ChatEvent {
    let username = payload
        .pointer("/sender/username")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .unwrap_or("Unknown");
    let content = payload.get("content").and_then(Value::as_str).unwrap_or("");
    ChatEvent {
        platform: Platform::Kick,
        username: username.to_owned(),
        text: escape_markup(content),
    }
}

/// Parses one IRC line of the form
/// `:<user>!<user>@<user>.tmi.twitch.tv PRIVMSG #<channel> :<message>`.
/// Anything that does not match is not an error, just not chat.
pub fn twitch_privmsg_event(line: &str) -> Option<ChatEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.splitn(4, ' ');
    let prefix = parts.next()?;
    let command = parts.next()?;
    let _target = parts.next()?;
    let trailing = parts.next()?;

    if command != "PRIVMSG" {
        return None;
    }
    let prefix = prefix.strip_prefix(':')?;
    let (username, rest) = prefix.split_once('!')?;
    if username.is_empty() || !rest.ends_with(".tmi.twitch.tv") {
        return None;
    }

    let text = trailing.strip_prefix(':').unwrap_or(trailing).trim();
    Some(ChatEvent {
        platform: Platform::Twitch,
        username: username.to_owned(),
        text: escape_markup(text),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{escape_markup, kick_chat_event, twitch_privmsg_event};
    use crate::events::Platform;

    #[test]
    fn escapes_angle_brackets_only() {
        assert_eq!(
            escape_markup("hi <b>there</b>"),
            "hi &lt;b&gt;there&lt;/b&gt;"
        );
        assert_eq!(escape_markup("a & b \"c\""), "a & b \"c\"");
    }

    #[test]
    fn kick_payload_maps_sender_and_content() {
        let payload = json!({
            "sender": {"username": "alice"},
            "content": "hi <b>there</b>"
        });
        let event = kick_chat_event(&payload);
        assert_eq!(event.platform, Platform::Kick);
        assert_eq!(event.username, "alice");
        assert_eq!(event.text, "hi &lt;b&gt;there&lt;/b&gt;");
    }

    #[test]
    fn kick_payload_defaults_missing_fields() {
        let event = kick_chat_event(&json!({"content": "hello"}));
        assert_eq!(event.username, "Unknown");
        assert_eq!(event.text, "hello");

        let event = kick_chat_event(&json!({"sender": {"username": "bob"}}));
        assert_eq!(event.username, "bob");
        assert_eq!(event.text, "");
    }

    #[test]
    fn parses_twitch_privmsg_line() {
        let line = ":bob!bob@bob.tmi.twitch.tv PRIVMSG #somechannel :hello world";
        let event = twitch_privmsg_event(line).expect("expected privmsg parse");
        assert_eq!(event.platform, Platform::Twitch);
        assert_eq!(event.username, "bob");
        assert_eq!(event.text, "hello world");
    }

    #[test]
    fn twitch_message_text_is_trimmed_and_escaped() {
        let line = ":bob!bob@bob.tmi.twitch.tv PRIVMSG #chan :  <script>  ";
        let event = twitch_privmsg_event(line).expect("expected privmsg parse");
        assert_eq!(event.text, "&lt;script&gt;");
    }

    #[test]
    fn ignores_non_privmsg_lines() {
        assert!(twitch_privmsg_event("PING :tmi.twitch.tv").is_none());
        assert!(twitch_privmsg_event(":tmi.twitch.tv 001 bob :Welcome, GLHF!").is_none());
        assert!(twitch_privmsg_event(":bob!bob@bob.tmi.twitch.tv JOIN #chan").is_none());
        assert!(twitch_privmsg_event("").is_none());
    }

    #[test]
    fn rejects_privmsg_with_foreign_prefix() {
        assert!(twitch_privmsg_event(":bob!bob@evil.example.com PRIVMSG #chan :hi").is_none());
    }
}
