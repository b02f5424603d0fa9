//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Provider credentials may also come from the environment (see
//! [`AppConfig::apply_env`]) so they never need to live in the binary.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// Settings for the real-time voice session provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Public (client-side) key handed to the provider when a session starts.
    pub public_key: String,
    /// Identifier of the remote agent the demo talks to.
    pub assistant_id: String,
    /// Base URL of the provider's REST API.
    pub api_base_url: String,
    /// Upper bound in seconds for the whole session handshake.
    pub connect_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            assistant_id: String::new(),
            api_base_url: "https://api.vapi.ai".into(),
            connect_timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// CallbackConfig
// ---------------------------------------------------------------------------

/// Settings for the "call me back" automation webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Automation endpoint that receives `{name, address, phone}`.
    pub webhook_url: String,
    /// Country-code token every phone number must start with (e.g. `"+1"`).
    pub country_code: String,
    /// Seconds the success message stays visible before the form resets.
    pub success_reset_secs: u64,
    /// Maximum seconds to wait for the webhook to answer.
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            country_code: "+1".into(),
            success_reset_secs: 5,
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and agent playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Play the agent's voice through the default output device.
    pub playback: bool,
    /// Number of bars in the live level visualizer.
    pub visualizer_bars: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            playback: true,
            visualizer_bars: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner window size `(width, height)` in logical pixels.
    pub window_size: (f32, f32),
    /// Keep the demo window above all other windows.
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (420.0, 640.0),
            always_on_top: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_demo::config::AppConfig;
///
/// // Load (writes and returns Default when the file is missing), then let
/// // the environment override credentials.
/// let mut config = AppConfig::load_or_init().unwrap();
/// config.apply_env();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Voice session provider settings.
    pub voice: VoiceConfig,
    /// Callback webhook settings.
    pub callback: CallbackConfig,
    /// Audio capture / playback settings.
    pub audio: AudioConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    pub const ENV_PUBLIC_KEY: &'static str = "VOICE_DEMO_PUBLIC_KEY";
    pub const ENV_ASSISTANT_ID: &'static str = "VOICE_DEMO_ASSISTANT_ID";
    pub const ENV_API_BASE_URL: &'static str = "VOICE_DEMO_API_BASE_URL";
    pub const ENV_WEBHOOK_URL: &'static str = "VOICE_DEMO_WEBHOOK_URL";

    /// Load from an explicit path.  Returns `Ok(AppConfig::default())` when
    /// the file does not exist; omitted keys take their defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the platform-appropriate `settings.toml`, writing the defaults
    /// there on first run so there is a file to edit.
    pub fn load_or_init() -> Result<Self> {
        Self::load_or_init_at(&AppPaths::new().settings_file)
    }

    pub fn load_or_init_at(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        config.save_to(path)?;
        log::info!("wrote default settings to {}", path.display());
        Ok(config)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override credentials and endpoints from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override credentials and endpoints from `lookup`.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// wipe a value from `settings.toml`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(Self::ENV_PUBLIC_KEY) {
            self.voice.public_key = v;
        }
        if let Some(v) = get(Self::ENV_ASSISTANT_ID) {
            self.voice.assistant_id = v;
        }
        if let Some(v) = get(Self::ENV_API_BASE_URL) {
            self.voice.api_base_url = v;
        }
        if let Some(v) = get(Self::ENV_WEBHOOK_URL) {
            self.callback.webhook_url = v;
        }
    }

    /// Human-readable list of settings the demo cannot work without.
    ///
    /// Startup logs these; the widget still launches so the failure shows up
    /// as a classified connection error instead of a crash.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.voice.public_key.is_empty() {
            missing.push("voice.public_key");
        }
        if self.voice.assistant_id.is_empty() {
            missing.push("voice.assistant_id");
        }
        if self.callback.webhook_url.is_empty() {
            missing.push("callback.webhook_url");
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.voice.api_base_url, "https://api.vapi.ai");
        assert_eq!(config.callback.country_code, "+1");
        assert_eq!(config.callback.success_reset_secs, 5);
        assert!(config.audio.input_device.is_none());
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.voice.public_key = "pk-live".into();
        cfg.voice.assistant_id = "asst-42".into();
        cfg.callback.webhook_url = "https://hooks.example.com/call-me".into();
        cfg.callback.country_code = "+44".into();
        cfg.audio.input_device = Some("USB Mic".into());
        cfg.audio.playback = false;
        cfg.ui.window_size = (500.0, 700.0);

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.voice.public_key, "pk-live");
        assert_eq!(loaded.voice.assistant_id, "asst-42");
        assert_eq!(loaded.callback.webhook_url, "https://hooks.example.com/call-me");
        assert_eq!(loaded.callback.country_code, "+44");
        assert_eq!(loaded.audio.input_device.as_deref(), Some("USB Mic"));
        assert!(!loaded.audio.playback);
        assert_eq!(loaded.ui.window_size, (500.0, 700.0));
    }

    #[test]
    fn partial_file_keeps_defaults_for_omitted_keys() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[voice]\npublic_key = \"pk\"\nassistant_id = \"a\"\n\n[callback]\nwebhook_url = \"http://hook\"\n",
        )
        .expect("write");

        let config = AppConfig::load_from(&path).expect("partial file should load");

        assert_eq!(config.voice.public_key, "pk");
        assert_eq!(config.voice.assistant_id, "a");
        assert_eq!(config.voice.api_base_url, "https://api.vapi.ai");
        assert_eq!(config.voice.connect_timeout_secs, 15);
        assert_eq!(config.callback.webhook_url, "http://hook");
        assert_eq!(config.callback.country_code, "+1");
        assert_eq!(config.callback.success_reset_secs, 5);
        assert!(config.audio.playback);
        assert_eq!(config.ui.window_size, (420.0, 640.0));
    }

    #[test]
    fn first_run_writes_defaults_then_reads_them_back() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("voice-demo").join("settings.toml");

        let created = AppConfig::load_or_init_at(&path).expect("init");
        assert!(path.exists());
        assert_eq!(created.callback.country_code, "+1");

        std::fs::write(&path, "[callback]\ncountry_code = \"+44\"\n").expect("write");
        let loaded = AppConfig::load_or_init_at(&path).expect("reload");
        assert_eq!(loaded.callback.country_code, "+44");
        assert_eq!(loaded.voice.api_base_url, "https://api.vapi.ai");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "voice = 12").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn overrides_replace_credentials() {
        let env: HashMap<&str, &str> = [
            (AppConfig::ENV_PUBLIC_KEY, "pk-env"),
            (AppConfig::ENV_ASSISTANT_ID, "asst-env"),
            (AppConfig::ENV_WEBHOOK_URL, "http://127.0.0.1:5678/webhook"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.voice.public_key, "pk-env");
        assert_eq!(cfg.voice.assistant_id, "asst-env");
        assert_eq!(cfg.callback.webhook_url, "http://127.0.0.1:5678/webhook");
        // Not overridden.
        assert_eq!(cfg.voice.api_base_url, "https://api.vapi.ai");
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut cfg = AppConfig::default();
        cfg.voice.public_key = "from-file".into();
        cfg.apply_overrides(|_| Some("   ".into()));

        assert_eq!(cfg.voice.public_key, "from-file");
    }

    #[test]
    fn missing_settings_lists_empty_credentials() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.missing_settings(),
            vec!["voice.public_key", "voice.assistant_id", "callback.webhook_url"]
        );

        let mut cfg = AppConfig::default();
        cfg.voice.public_key = "pk".into();
        cfg.voice.assistant_id = "a".into();
        cfg.callback.webhook_url = "http://x".into();
        assert!(cfg.missing_settings().is_empty());
    }
}
