//! Microphone acquisition gate.
//!
//! Before a voice session is attempted the widget claims the input device
//! through a [`MicrophoneGate`].  A successful acquisition yields a
//! [`MicrophoneLease`]: the stream of captured frames plus the guard that
//! keeps the device claimed.  Failures are typed as [`AcquireError`] so the
//! caller can show permission or busy-device guidance before any network
//! traffic happens.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::capture::{self, AudioChunk, CaptureError, StreamHandle};
use super::level::LevelMeter;

// ---------------------------------------------------------------------------
// AcquireError
// ---------------------------------------------------------------------------

/// Why the microphone could not be claimed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquireError {
    /// The user or the OS refused access to the input device.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No device, or the device is held by another application.
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Host backends report denials as free-form text.
fn mentions_denial(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    ["permission", "denied", "not allowed", "access", "eacces", "operation not permitted"]
        .iter()
        .any(|needle| text.contains(needle))
}

impl From<CaptureError> for AcquireError {
    fn from(err: CaptureError) -> Self {
        let detail = err.to_string();
        if mentions_denial(&detail) {
            AcquireError::PermissionDenied(detail)
        } else {
            AcquireError::DeviceUnavailable(detail)
        }
    }
}

// ---------------------------------------------------------------------------
// MicrophoneLease
// ---------------------------------------------------------------------------

/// Exclusive claim on the input device for one voice session.
///
/// Dropping the lease stops the capture stream and releases the device.
pub struct MicrophoneLease {
    frames: mpsc::UnboundedReceiver<AudioChunk>,
    sample_rate: u32,
    channels: u16,
    _stream: Option<StreamHandle>,
}

impl MicrophoneLease {
    /// Build a lease over an arbitrary frame source (no hardware attached).
    ///
    /// Used by custom gates and by tests.
    pub fn from_parts(frames: mpsc::UnboundedReceiver<AudioChunk>, sample_rate: u32, channels: u16) -> Self {
        Self {
            frames,
            sample_rate,
            channels,
            _stream: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Drop every buffer captured so far and return how many were dropped.
    ///
    /// Capture starts when the device is claimed, well before the session is
    /// connected; audio from the handshake window is never sent.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.frames.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Next captured buffer, or `None` once the device stream has ended.
    pub async fn next_chunk(&mut self) -> Option<AudioChunk> {
        self.frames.recv().await
    }
}

impl std::fmt::Debug for MicrophoneLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneLease")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("hardware", &self._stream.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MicrophoneGate
// ---------------------------------------------------------------------------

/// Claims the local audio input device.
#[async_trait]
pub trait MicrophoneGate: Send + Sync {
    async fn acquire(&self) -> Result<MicrophoneLease, AcquireError>;
}

/// [`MicrophoneGate`] backed by a cpal input stream.
pub struct CpalMicrophoneGate {
    device_name: Option<String>,
    meter: LevelMeter,
}

impl CpalMicrophoneGate {
    /// `device_name` of `None` selects the system default input.  Every
    /// captured buffer is also recorded into `meter`.
    pub fn new(device_name: Option<String>, meter: LevelMeter) -> Self {
        Self { device_name, meter }
    }
}

#[async_trait]
impl MicrophoneGate for CpalMicrophoneGate {
    async fn acquire(&self) -> Result<MicrophoneLease, AcquireError> {
        let device_name = self.device_name.clone();
        let meter = self.meter.clone();

        let opened = tokio::task::spawn_blocking(move || {
            let (tx, rx) = mpsc::unbounded_channel();
            let (stream, format) = capture::open_input(device_name.as_deref(), move |chunk| {
                meter.record(&chunk.samples);
                // Receiver gone means the session ended; the stream is about
                // to be dropped with the lease.
                let _ = tx.send(chunk);
            })?;
            Ok::<_, CaptureError>((stream, format, rx))
        })
        .await
        .map_err(|e| AcquireError::DeviceUnavailable(format!("audio thread failed: {e}")))?;

        let (stream, format, frames) = opened.map_err(|e| {
            let err = AcquireError::from(e);
            log::warn!("microphone acquisition failed: {err}");
            err
        })?;

        Ok(MicrophoneLease {
            frames,
            sample_rate: format.sample_rate,
            channels: format.channels,
            _stream: Some(stream),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
