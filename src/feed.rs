use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::events::ChatEvent;

/// How long a fading entry stays visible before it is dropped.
pub const FADE_DURATION: Duration = Duration::from_millis(500);

/// One visible chat message. Owned exclusively by the [`ChatFeed`];
/// mutated only to flag the fading state, destroyed on eviction.
#[derive(Debug, Clone)]
pub struct DisplayEntry {
    pub event: ChatEvent,
    pub inserted_at: Instant,
    pub expires_at: Option<Instant>,
    fading_since: Option<Instant>,
}

impl DisplayEntry {
    pub fn is_fading(&self) -> bool {
        self.fading_since.is_some()
    }

    /// 1.0 while live, linear ramp to 0.0 across [`FADE_DURATION`]
    /// once the entry has been flagged fading.
    pub fn opacity(&self, now: Instant) -> f32 {
        let Some(started) = self.fading_since else {
            return 1.0;
        };
        if now <= started {
            return 1.0;
        }
        let elapsed = now.duration_since(started).as_secs_f32();
        (1.0 - elapsed / FADE_DURATION.as_secs_f32()).clamp(0.0, 1.0)
    }
}

/// Bounded, ordered, time-decaying buffer of visible chat messages.
/// Oldest entries sit at the front; the newest is appended at the
/// back. Single-owner: all mutation happens on the render thread.
#[derive(Debug)]
pub struct ChatFeed {
    entries: VecDeque<DisplayEntry>,
    max_messages: usize,
    message_duration: Duration,
}

impl ChatFeed {
    /// `message_duration` of zero means entries never expire by time.
    pub fn new(max_messages: usize, message_duration: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            max_messages: max_messages.max(1),
            message_duration,
        }
    }

    pub fn insert(&mut self, event: ChatEvent) {
        self.insert_at(event, Instant::now());
    }

    /// Appends an entry and enforces the capacity cap synchronously.
    /// Capacity eviction is FIFO and takes precedence over any timer:
    /// the buffer never exceeds `max_messages`, even transiently.
    pub fn insert_at(&mut self, event: ChatEvent, now: Instant) {
        let expires_at = if self.message_duration.is_zero() {
            None
        } else {
            Some(now + self.message_duration)
        };
        // Ordering invariant: entries stay sorted by inserted_at.
        debug_assert!(self
            .entries
            .back()
            .map(|entry| entry.inserted_at <= now)
            .unwrap_or(true));
        self.entries.push_back(DisplayEntry {
            event,
            inserted_at: now,
            expires_at,
            fading_since: None,
        });
        while self.entries.len() > self.max_messages {
            self.entries.pop_front();
        }
    }

    /// Two-phase expiry: entries past `expires_at` are flagged fading
    /// (anchored at the expiry instant, so removal lands at
    /// `expires_at + FADE_DURATION` regardless of sweep cadence) and
    /// dropped once the fade interval has elapsed.
    pub fn sweep(&mut self, now: Instant) {
        for entry in &mut self.entries {
            if entry.fading_since.is_none() {
                if let Some(expires_at) = entry.expires_at {
                    if now >= expires_at {
                        entry.fading_since = Some(expires_at);
                    }
                }
            }
        }
        self.entries
            .retain(|entry| match entry.fading_since {
                Some(started) => now < started + FADE_DURATION,
                None => true,
            });
    }

    pub fn entries(&self) -> impl Iterator<Item = &DisplayEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{ChatFeed, FADE_DURATION};
    use crate::events::{ChatEvent, Platform};

    fn event(text: &str) -> ChatEvent {
        ChatEvent {
            platform: Platform::Twitch,
            username: "bob".to_owned(),
            text: text.to_owned(),
        }
    }

    #[test]
    fn capacity_cap_holds_under_burst_inserts() {
        let mut feed = ChatFeed::new(3, Duration::ZERO);
        let now = Instant::now();
        for index in 0..10 {
            feed.insert_at(event(&format!("m{index}")), now);
            assert!(feed.len() <= 3);
        }
        let texts: Vec<_> = feed.entries().map(|e| e.event.text.as_str()).collect();
        assert_eq!(texts, vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let mut feed = ChatFeed::new(10, Duration::ZERO);
        let t0 = Instant::now();
        feed.insert_at(event("first"), t0);
        feed.insert_at(event("second"), t0 + Duration::from_millis(1));
        feed.insert_at(event("third"), t0 + Duration::from_millis(2));
        let texts: Vec<_> = feed.entries().map(|e| e.event.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn expiry_fades_then_removes_after_fixed_interval() {
        let duration = Duration::from_secs(10);
        let mut feed = ChatFeed::new(5, duration);
        let t0 = Instant::now();
        feed.insert_at(event("hello"), t0);

        feed.sweep(t0 + duration - Duration::from_millis(1));
        assert_eq!(feed.len(), 1);
        assert!(!feed.entries().next().unwrap().is_fading());

        feed.sweep(t0 + duration);
        assert_eq!(feed.len(), 1);
        assert!(feed.entries().next().unwrap().is_fading());

        feed.sweep(t0 + duration + FADE_DURATION - Duration::from_millis(1));
        assert_eq!(feed.len(), 1);

        feed.sweep(t0 + duration + FADE_DURATION);
        assert!(feed.is_empty());
    }

    #[test]
    fn fade_anchor_is_expiry_not_sweep_time() {
        let duration = Duration::from_secs(10);
        let mut feed = ChatFeed::new(5, duration);
        let t0 = Instant::now();
        feed.insert_at(event("hello"), t0);

        // A late first sweep must not extend the entry's lifetime.
        feed.sweep(t0 + duration + FADE_DURATION);
        assert!(feed.is_empty());
    }

    #[test]
    fn zero_duration_entries_never_expire() {
        let mut feed = ChatFeed::new(5, Duration::ZERO);
        let t0 = Instant::now();
        feed.insert_at(event("forever"), t0);
        feed.sweep(t0 + Duration::from_secs(86_400));
        assert_eq!(feed.len(), 1);
        assert!(!feed.entries().next().unwrap().is_fading());
    }

    #[test]
    fn expiry_of_each_entry_is_independent() {
        let duration = Duration::from_secs(10);
        let mut feed = ChatFeed::new(5, duration);
        let t0 = Instant::now();
        feed.insert_at(event("early"), t0);
        feed.insert_at(event("late"), t0 + Duration::from_secs(4));

        feed.sweep(t0 + duration + FADE_DURATION);
        let texts: Vec<_> = feed.entries().map(|e| e.event.text.as_str()).collect();
        assert_eq!(texts, vec!["late"]);
    }

    #[test]
    fn capacity_eviction_removes_fading_entries_first() {
        let duration = Duration::from_secs(1);
        let mut feed = ChatFeed::new(2, duration);
        let t0 = Instant::now();
        feed.insert_at(event("old"), t0);
        feed.sweep(t0 + duration);
        assert!(feed.entries().next().unwrap().is_fading());

        // Fading entries still count against the cap and are the
        // oldest, so a burst evicts them immediately.
        feed.insert_at(event("a"), t0 + duration);
        feed.insert_at(event("b"), t0 + duration);
        assert_eq!(feed.len(), 2);
        let texts: Vec<_> = feed.entries().map(|e| e.event.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn opacity_ramps_down_during_fade() {
        let duration = Duration::from_secs(1);
        let mut feed = ChatFeed::new(2, duration);
        let t0 = Instant::now();
        feed.insert_at(event("hello"), t0);

        let live_at = t0 + Duration::from_millis(500);
        feed.sweep(live_at);
        let entry = feed.entries().next().unwrap().clone();
        assert_eq!(entry.opacity(live_at), 1.0);

        feed.sweep(t0 + duration);
        let entry = feed.entries().next().unwrap().clone();
        let mid_fade = entry.opacity(t0 + duration + FADE_DURATION / 2);
        assert!(mid_fade > 0.4 && mid_fade < 0.6, "got {mid_fade}");
        assert_eq!(entry.opacity(t0 + duration + FADE_DURATION), 0.0);
    }

    #[test]
    fn max_messages_is_clamped_to_at_least_one() {
        let mut feed = ChatFeed::new(0, Duration::ZERO);
        feed.insert(event("only"));
        feed.insert(event("newer"));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.entries().next().unwrap().event.text, "newer");
    }
}
