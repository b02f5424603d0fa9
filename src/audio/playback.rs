//! Agent voice playback via `cpal`.
//!
//! [`AudioPlayback`] owns an output stream on its own thread and a sample
//! queue fed by the session transport.  The output callback drains the queue
//! and plays silence when it runs dry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait};

use super::capture::{spawn_stream, CaptureError, StreamFormat, StreamHandle};
use super::pcm::resample_linear;

/// Queue bound in seconds of device-rate audio; older audio is dropped first.
const MAX_QUEUED_SECS: usize = 10;

type SampleQueue = Arc<Mutex<VecDeque<f32>>>;

/// Plays mono PCM arriving at `source_rate` on the default output device.
pub struct AudioPlayback {
    queue: SampleQueue,
    source_rate: u32,
    device_rate: u32,
    _stream: StreamHandle,
}

impl AudioPlayback {
    /// Open the default output device.  Blocks while the device starts; call
    /// from `spawn_blocking` in async code.
    pub fn open(source_rate: u32) -> Result<Self, CaptureError> {
        let queue: SampleQueue = Arc::new(Mutex::new(VecDeque::new()));
        let cb_queue = Arc::clone(&queue);

        let (stream, format) = spawn_stream("agent-playback", move || {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(CaptureError::NoOutputDevice)?;
            let supported = device.default_output_config()?;

            let format = StreamFormat {
                sample_rate: supported.sample_rate().0,
                channels: supported.channels(),
            };
            let config: cpal::StreamConfig = supported.into();
            let channels = format.channels.max(1) as usize;

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_frames(&cb_queue, data, channels);
                },
                |err: cpal::StreamError| {
                    log::error!("playback stream error: {err}");
                },
                None,
            )?;
            Ok((stream, format))
        })?;

        log::info!(
            "agent playback open ({} Hz device, {} Hz source)",
            format.sample_rate,
            source_rate
        );

        Ok(Self {
            queue,
            source_rate,
            device_rate: format.sample_rate,
            _stream: stream,
        })
    }

    /// Queue mono samples received from the agent.
    pub fn push(&self, mono: &[f32]) {
        let samples = resample_linear(mono, self.source_rate, self.device_rate);
        let limit = self.device_rate as usize * MAX_QUEUED_SECS;
        if let Ok(mut queue) = self.queue.lock() {
            enqueue_bounded(&mut queue, &samples, limit);
        }
    }

    /// Drop everything not yet played (e.g. when the agent is interrupted).
    pub fn clear(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}

fn enqueue_bounded(queue: &mut VecDeque<f32>, samples: &[f32], limit: usize) {
    queue.extend(samples.iter().copied());
    let excess = queue.len().saturating_sub(limit);
    queue.drain(..excess);
}

/// Write one queued mono sample into every channel of each output frame.
fn fill_frames(queue: &SampleQueue, data: &mut [f32], channels: usize) {
    let Ok(mut queue) = queue.lock() else {
        data.fill(0.0);
        return;
    };
    for frame in data.chunks_mut(channels) {
        let sample = queue.pop_front().unwrap_or(0.0);
        frame.fill(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_duplicate_mono_and_pad_with_silence() {
        let queue: SampleQueue = Arc::new(Mutex::new(VecDeque::from(vec![0.5, -0.5])));
        let mut out = vec![9.0_f32; 6];
        fill_frames(&queue, &mut out, 2);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
        assert!(queue.lock().unwrap().is_empty());
    }

    #[test]
    fn bounded_queue_drops_oldest() {
        let mut queue = VecDeque::new();
        enqueue_bounded(&mut queue, &[1.0, 2.0, 3.0], 4);
        enqueue_bounded(&mut queue, &[4.0, 5.0], 4);
        assert_eq!(queue, VecDeque::from(vec![2.0, 3.0, 4.0, 5.0]));
    }
}
