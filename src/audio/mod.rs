//! Audio plumbing: microphone gate → capture → wire PCM, and agent playback.
//!
//! # Flow
//!
//! ```text
//! MicrophoneGate::acquire ──▶ cpal input thread ──▶ AudioChunk (mpsc)
//!                                   │                   └─▶ MicrophoneLease ─▶ transport
//!                                   └─▶ LevelMeter ─▶ LevelHistory ─▶ visualizer bars
//! transport ─▶ decode_s16le ─▶ AudioPlayback ─▶ cpal output thread
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_demo::audio::{CpalMicrophoneGate, LevelMeter, MicrophoneGate};
//!
//! # async fn example() {
//! let gate = CpalMicrophoneGate::new(None, LevelMeter::new());
//! match gate.acquire().await {
//!     Ok(mut lease) => {
//!         while let Some(chunk) = lease.next_chunk().await {
//!             println!("{} samples @ {} Hz", chunk.samples.len(), chunk.sample_rate);
//!         }
//!     }
//!     Err(e) => eprintln!("{e}"),
//! }
//! # }
//! ```

pub mod capture;
pub mod gate;
pub mod level;
pub mod pcm;
pub mod playback;

pub use capture::{AudioChunk, CaptureError, StreamFormat, StreamHandle};
pub use gate::{AcquireError, CpalMicrophoneGate, MicrophoneGate, MicrophoneLease};
pub use level::{rms, LevelHistory, LevelMeter};
pub use pcm::{decode_s16le, downmix_to_mono, encode_s16le, resample_linear};
pub use playback::AudioPlayback;
