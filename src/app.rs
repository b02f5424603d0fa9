//! Voice demo window: egui/eframe application.
//!
//! # Architecture
//!
//! [`DemoApp`] is the top-level [`eframe::App`].  It owns no session logic;
//! every frame it reads two shared snapshots and sends intents back:
//!
//! * `state`: [`SharedWidgetState`] written by the
//!   [`VoiceWidget`](crate::session::VoiceWidget) task.
//! * `command_tx`: sends [`WidgetCommand`] to that task.
//! * `submitter`: [`CallbackSubmitter`] over the shared callback form;
//!   submissions are spawned on the tokio runtime.
//!
//! # Widget States
//!
//! | State | Visual |
//! |-------|--------|
//! | `Idle` | "Talk to our AI", mic button, "Ready" |
//! | `Connecting` | Spinner in a disabled button, "Connecting..." |
//! | `Active` | "Agent Connected", red hang-up button, pulsing ring, "Live", level bars |
//! | any + error | "!" icon and the classified message instead of the status |

use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::audio::LevelHistory;
use crate::callback::{CallbackStatus, CallbackSubmitter};
use crate::config::AppConfig;
use crate::session::{ErrorClassification, SessionState, SharedWidgetState, WidgetCommand};

const ACCENT: egui::Color32 = egui::Color32::from_rgb(34, 211, 238);
const DANGER: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);
const MUTED: egui::Color32 = egui::Color32::from_rgb(148, 163, 184);
const SUCCESS: egui::Color32 = egui::Color32::from_rgb(74, 222, 128);

const BUTTON_RADIUS: f32 = 36.0;

// ---------------------------------------------------------------------------
// DemoApp
// ---------------------------------------------------------------------------

/// eframe application: the voice demo widget plus the callback form.
pub struct DemoApp {
    // ── Shared state ─────────────────────────────────────────────────────
    state: SharedWidgetState,
    command_tx: mpsc::Sender<WidgetCommand>,
    submitter: CallbackSubmitter,
    runtime: tokio::runtime::Handle,

    // ── Visualizer ───────────────────────────────────────────────────────
    history: LevelHistory,

    /// Application configuration (read-only after startup).
    config: AppConfig,
}

impl DemoApp {
    pub fn new(
        state: SharedWidgetState,
        command_tx: mpsc::Sender<WidgetCommand>,
        submitter: CallbackSubmitter,
        runtime: tokio::runtime::Handle,
        config: AppConfig,
    ) -> Self {
        Self {
            state,
            command_tx,
            submitter,
            runtime,
            history: LevelHistory::new(config.audio.visualizer_bars),
            config,
        }
    }

    /// Snapshot of the session state, error and current input level.
    fn snapshot(&self) -> (SessionState, ErrorClassification, f32) {
        match self.state.lock() {
            Ok(st) => (st.session, st.error, st.level.level()),
            Err(_) => (SessionState::Idle, ErrorClassification::ConnectionFailed, 0.0),
        }
    }

    fn send(&self, command: WidgetCommand) {
        if let Err(e) = self.command_tx.try_send(command) {
            log::warn!("voice widget command dropped: {e}");
        }
    }

    // ── Voice panel ──────────────────────────────────────────────────────

    fn draw_voice(&mut self, ui: &mut egui::Ui, session: SessionState, error: ErrorClassification, time: f64) {
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new(session.headline()).size(20.0).strong());
            ui.label(egui::RichText::new(session.hint()).color(MUTED).size(12.0));
            ui.add_space(16.0);

            self.draw_call_button(ui, session, error, time);

            ui.add_space(14.0);
            if let Some(message) = error.message() {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("!").color(DANGER).strong().size(14.0));
                    ui.label(egui::RichText::new(message).color(DANGER).size(13.0));
                });
            } else {
                ui.label(egui::RichText::new(session.status_label()).color(MUTED).size(12.0));
                if session == SessionState::Active {
                    self.draw_level_bars(ui);
                }
            }
        });
    }

    fn draw_call_button(&self, ui: &mut egui::Ui, session: SessionState, error: ErrorClassification, time: f64) {
        let size = egui::vec2(BUTTON_RADIUS * 3.0, BUTTON_RADIUS * 3.0);
        let sense = if session == SessionState::Connecting {
            egui::Sense::hover()
        } else {
            egui::Sense::click()
        };
        let (rect, response) = ui.allocate_exact_size(size, sense);
        let center = rect.center();
        let painter = ui.painter().clone();

        if session.shows_ring() {
            let phase = (time % 1.5 / 1.5) as f32;
            let alpha = ((1.0 - phase) * 120.0) as u8;
            painter.circle_stroke(
                center,
                BUTTON_RADIUS + phase * BUTTON_RADIUS * 0.45,
                egui::Stroke::new(3.0, egui::Color32::from_rgba_unmultiplied(239, 68, 68, alpha)),
            );
        }

        let fill = match session {
            SessionState::Active => DANGER,
            SessionState::Connecting => egui::Color32::from_rgb(51, 65, 85),
            SessionState::Idle if response.hovered() => egui::Color32::from_rgb(103, 232, 249),
            SessionState::Idle => ACCENT,
        };
        painter.circle_filled(center, BUTTON_RADIUS, fill);
        if !error.is_none() {
            painter.circle_stroke(center, BUTTON_RADIUS, egui::Stroke::new(2.0, DANGER));
        }

        match session {
            SessionState::Connecting => {
                let spinner_rect = egui::Rect::from_center_size(center, egui::vec2(28.0, 28.0));
                ui.put(spinner_rect, egui::Spinner::new().size(28.0).color(egui::Color32::WHITE));
            }
            SessionState::Active => paint_hang_up_icon(&painter, center),
            SessionState::Idle => paint_mic_icon(&painter, center),
        }

        if response.clicked() {
            if session.shows_hang_up() {
                self.send(WidgetCommand::HangUp);
            } else if session.start_enabled() {
                self.send(WidgetCommand::StartCall);
            }
        }
    }

    fn draw_level_bars(&self, ui: &mut egui::Ui) {
        let bars = self.history.bars();
        let (rect, _) = ui.allocate_exact_size(egui::vec2(60.0, 24.0), egui::Sense::hover());
        let painter = ui.painter();
        let slot = rect.width() / bars.len().max(1) as f32;

        for (i, &height) in bars.iter().enumerate() {
            let x = rect.left() + slot * (i as f32 + 0.5);
            painter.rect_filled(
                egui::Rect::from_center_size(
                    egui::pos2(x, rect.center().y),
                    egui::vec2(slot * 0.6, (height * rect.height()).max(2.0)),
                ),
                2.0,
                ACCENT,
            );
        }
    }

    // ── Callback form ────────────────────────────────────────────────────

    fn draw_callback_form(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Or get a call from our agent").size(15.0).strong());
        ui.add_space(6.0);

        let Ok(mut form) = self.submitter.form().lock() else {
            return;
        };
        let editable = form.status != CallbackStatus::Sending;

        ui.add_enabled(
            editable,
            egui::TextEdit::singleline(&mut form.name).hint_text("Full name"),
        );
        ui.add_enabled(
            editable,
            egui::TextEdit::singleline(&mut form.address).hint_text("Property address"),
        );

        let mut phone = form.phone.value().to_string();
        let response = ui.add_enabled(editable, egui::TextEdit::singleline(&mut phone));
        if response.changed() && !form.phone.edit(&phone) {
            log::debug!("phone edit rejected");
        }

        ui.add_space(6.0);
        let can_submit = form.can_submit();
        let status = form.status;
        let detail = form.error_detail().map(str::to_owned);
        drop(form);

        let button = egui::Button::new(egui::RichText::new(status.button_label()).strong());
        if ui.add_enabled(can_submit, button).clicked() {
            let submitter = self.submitter.clone();
            self.runtime.spawn(async move {
                if let Err(e) = submitter.submit().await {
                    log::debug!("callback submit: {e}");
                }
            });
        }

        if let Some(message) = status.message() {
            let color = if status == CallbackStatus::Success { SUCCESS } else { DANGER };
            ui.label(egui::RichText::new(message).color(color).size(12.0));
        }
        if let Some(detail) = detail {
            ui.label(egui::RichText::new(detail).color(MUTED).size(10.0));
        }
    }
}

// ---------------------------------------------------------------------------
// Icons
// ---------------------------------------------------------------------------

fn paint_mic_icon(painter: &egui::Painter, center: egui::Pos2) {
    let white = egui::Color32::WHITE;
    let capsule = egui::Rect::from_center_size(center - egui::vec2(0.0, 5.0), egui::vec2(12.0, 20.0));
    painter.rect_filled(capsule, 6.0, white);

    let stroke = egui::Stroke::new(2.5, white);
    let base = center + egui::vec2(0.0, 9.0);
    painter.line_segment([base, base + egui::vec2(0.0, 6.0)], stroke);
    painter.line_segment([base + egui::vec2(-6.0, 6.0), base + egui::vec2(6.0, 6.0)], stroke);
}

fn paint_hang_up_icon(painter: &egui::Painter, center: egui::Pos2) {
    let handset = egui::Rect::from_center_size(center, egui::vec2(30.0, 9.0));
    painter.rect_filled(handset, 4.5, egui::Color32::WHITE);
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for DemoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let (session, error, level) = self.snapshot();
        let time = ctx.input(|i| i.time);

        if session == SessionState::Active {
            self.history.push(level);
        } else {
            self.history.clear();
        }

        // --- Schedule repaints while animated or waiting on a task --------
        let callback_status = self
            .submitter
            .form()
            .lock()
            .map(|f| f.status)
            .unwrap_or_default();
        match session {
            SessionState::Active => ctx.request_repaint_after(Duration::from_millis(33)),
            SessionState::Connecting => ctx.request_repaint_after(Duration::from_millis(66)),
            SessionState::Idle if callback_status != CallbackStatus::Idle => {
                ctx.request_repaint_after(Duration::from_millis(250))
            }
            // Background events may still move the widget out of Idle.
            SessionState::Idle => ctx.request_repaint_after(Duration::from_millis(500)),
        }

        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgb(15, 23, 42))
            .inner_margin(egui::Margin::same(20));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            self.draw_voice(ui, session, error, time);
            ui.add_space(18.0);
            ui.separator();
            ui.add_space(10.0);
            self.draw_callback_form(ui);

            let missing = self.config.missing_settings();
            if !missing.is_empty() {
                ui.add_space(10.0);
                ui.label(
                    egui::RichText::new(format!("Not configured: {}", missing.join(", ")))
                        .color(MUTED)
                        .size(10.0),
                );
            }
        });
    }

    /// Unmount the widget: stop any live session and cancel pending timers.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("voice demo closing");
        self.send(WidgetCommand::Unmount);
        self.submitter.shutdown();
    }
}
