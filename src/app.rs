use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use eframe::egui::{self, Color32, FontId, Margin, RichText, Rounding};
use tokio::sync::watch;

use crate::{
    config::OverlayConfig,
    events::{ChatEvent, Platform},
    feed::{ChatFeed, DisplayEntry},
};

/// The overlay window: drains the adapter channel into the display
/// buffer and renders it as a transparent auto-scrolling feed. Knows
/// nothing about transports.
pub struct OverlayApp {
    events: Receiver<ChatEvent>,
    config: OverlayConfig,
    feed: ChatFeed,
    shutdown: watch::Sender<bool>,
}

impl OverlayApp {
    pub fn new(
        events: Receiver<ChatEvent>,
        config: OverlayConfig,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        let feed = ChatFeed::new(
            config.max_messages,
            Duration::from_secs(config.message_duration),
        );
        Self {
            events,
            config,
            feed,
            shutdown,
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.feed.insert(event);
            tracing::trace!(entries = self.feed.len(), "inserted chat message");
        }
    }
}

impl eframe::App for OverlayApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        // Fully transparent window; only message rows paint pixels.
        [0.0, 0.0, 0.0, 0.0]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        let now = Instant::now();
        self.feed.sweep(now);
        ctx.request_repaint_after(Duration::from_millis(33));
        if self.feed.is_empty() {
            return;
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for entry in self.feed.entries() {
                            draw_message_row(ui, entry, &self.config, now);
                        }
                    });
            });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Session teardown: supervisors stop reconnecting.
        let _ = self.shutdown.send(true);
    }
}

fn draw_message_row(ui: &mut egui::Ui, entry: &DisplayEntry, config: &OverlayConfig, now: Instant) {
    let alpha = entry.opacity(now);
    let font = FontId::proportional(config.font_size as f32);
    let accent = fade(platform_color(entry.event.platform), alpha);
    let text_color = fade(Color32::WHITE, alpha);
    let bg = Color32::from_black_alpha((config.bg_opacity * alpha * 255.0).round() as u8);

    egui::Frame::none()
        .fill(bg)
        .rounding(Rounding::same(4.0))
        .inner_margin(Margin::symmetric(8.0, 4.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal_wrapped(|ui| {
                if config.show_badges {
                    ui.label(
                        RichText::new(entry.event.platform.badge_glyph())
                            .font(FontId::proportional(config.font_size as f32 * 0.85))
                            .strong()
                            .color(fade(Color32::BLACK, alpha))
                            .background_color(accent),
                    );
                }
                ui.label(
                    RichText::new(&entry.event.username)
                        .font(font.clone())
                        .strong()
                        .color(accent),
                );
                ui.label(RichText::new(":").font(font.clone()).color(text_color));
                ui.label(
                    RichText::new(&entry.event.text)
                        .font(font)
                        .color(text_color),
                );
            });
        });
    ui.add_space(4.0);
}

fn platform_color(platform: Platform) -> Color32 {
    let (r, g, b) = platform.accent_rgb();
    Color32::from_rgb(r, g, b)
}

fn fade(color: Color32, alpha: f32) -> Color32 {
    color.gamma_multiply(alpha.clamp(0.0, 1.0))
}
