//! Microphone capture via `cpal`.
//!
//! cpal streams are not `Send` on every platform, so each stream is built,
//! played and dropped on its own OS thread.  The caller gets back a
//! [`StreamHandle`], a RAII guard whose drop wakes that thread and stops the
//! underlying hardware stream.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

/// Negotiated format of an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps a cpal stream alive on its owning thread.
///
/// Dropping this value closes the stop channel; the owning thread wakes up,
/// drops the `cpal::Stream` and exits.
pub struct StreamHandle {
    _stop: mpsc::Sender<()>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamHandle")
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening an audio stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("no output device found on the default audio host")]
    NoOutputDevice,

    #[error("audio device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn audio thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("audio thread exited before the stream was ready")]
    ThreadExited,
}

// ---------------------------------------------------------------------------
// Stream thread
// ---------------------------------------------------------------------------

/// Build and play a stream on a dedicated thread named `thread_name`.
///
/// `build` runs on that thread and returns the stream plus whatever format
/// information the caller needs.  This function blocks until the stream is
/// playing or has failed, so call it from `spawn_blocking` in async code.
pub(crate) fn spawn_stream<T, F>(thread_name: &str, build: F) -> Result<(StreamHandle, T), CaptureError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<(cpal::Stream, T), CaptureError> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::channel::<Result<T, CaptureError>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    std::thread::Builder::new()
        .name(thread_name.into())
        .spawn(move || {
            let stream = match build().and_then(|(stream, info)| {
                stream.play()?;
                Ok((stream, info))
            }) {
                Ok((stream, info)) => {
                    let _ = ready_tx.send(Ok(info));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Returns Err once the StreamHandle (sole sender) is dropped.
            let _ = stop_rx.recv();
            drop(stream);
            log::debug!("audio stream thread exiting");
        })?;

    let info = ready_rx.recv().map_err(|_| CaptureError::ThreadExited)??;
    Ok((StreamHandle { _stop: stop_tx }, info))
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Resolve `name` to an input device, or the host default when `None`.
fn find_input_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    match name {
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string())),
    }
}

/// Open the input device `device_name` (default when `None`) and deliver
/// every hardware buffer to `on_chunk`.
///
/// `on_chunk` runs on the cpal audio thread; it must not block.
pub fn open_input<F>(device_name: Option<&str>, mut on_chunk: F) -> Result<(StreamHandle, StreamFormat), CaptureError>
where
    F: FnMut(AudioChunk) + Send + 'static,
{
    let device_name = device_name.map(str::to_string);

    spawn_stream("mic-capture", move || {
        let host = cpal::default_host();
        let device = find_input_device(&host, device_name.as_deref())?;
        let supported = device.default_input_config()?;

        let format = StreamFormat {
            sample_rate: supported.sample_rate().0,
            channels: supported.channels(),
        };
        let config: cpal::StreamConfig = supported.into();

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                on_chunk(AudioChunk {
                    samples: data.to_vec(),
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                });
            },
            |err: cpal::StreamError| {
                log::error!("microphone stream error: {err}");
            },
            None,
        )?;

        log::info!(
            "microphone open ({} Hz, {} ch)",
            format.sample_rate,
            format.channels
        );
        Ok((stream, format))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
