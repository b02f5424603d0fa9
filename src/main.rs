//! Application entry point for the live voice demo.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (writing defaults on first run), then apply
//!    environment overrides for credentials.
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Mount the voice widget: shared state, microphone gate, transport and
//!    the [`VoiceWidget`] task.
//! 5. Build the callback submitter over the webhook endpoint.
//! 6. Run [`eframe::run_native`], which blocks the main thread until the
//!    window is closed.

use std::sync::Arc;

use eframe::egui;
use tokio::sync::mpsc;
use voice_demo::{
    app::DemoApp,
    audio::{CpalMicrophoneGate, LevelMeter},
    callback::{new_shared_form, CallbackSubmitter, WebhookEndpoint},
    config::AppConfig,
    session::{new_shared_state, VoiceWidget, WebSocketTransport, WidgetCommand},
};

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Voice Demo")
        .with_inner_size([width, height])
        .with_min_inner_size([320.0, 480.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice demo starting up");

    // 2. Configuration
    let mut config = AppConfig::load_or_init().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.apply_env();
    for setting in config.missing_settings() {
        log::warn!("{setting} is not set; see settings.toml or the VOICE_DEMO_* environment variables");
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 4. Voice widget
    let meter = LevelMeter::new();
    let state = new_shared_state(meter.clone());
    let gate = Arc::new(CpalMicrophoneGate::new(config.audio.input_device.clone(), meter));
    let transport = Arc::new(WebSocketTransport::from_config(&config.voice, &config.audio));

    let (command_tx, command_rx) = mpsc::channel::<WidgetCommand>(16);
    let widget = VoiceWidget::new(state.clone(), gate, transport, &config.voice);
    let widget_task = rt.spawn(widget.run(command_rx));

    // 5. Callback submitter
    let form = new_shared_form(&config.callback.country_code);
    let endpoint = Arc::new(WebhookEndpoint::from_config(&config.callback));
    let submitter = CallbackSubmitter::from_config(form, endpoint, &config.callback);

    // 6. UI (blocks until the window is closed)
    let app = DemoApp::new(state, command_tx, submitter, rt.handle().clone(), config.clone());
    let options = native_options(&config);

    eframe::run_native("Voice Demo", options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("UI error: {e}"))?;

    // The app sent Unmount on exit and dropped its sender; let the widget
    // stop its session before the runtime goes away.
    if let Err(e) = rt.block_on(widget_task) {
        log::warn!("voice widget task ended abnormally: {e}");
    }
    log::info!("voice demo shut down");
    Ok(())
}
