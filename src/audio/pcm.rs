//! PCM conversion between the capture/playback devices and the wire.
//!
//! The voice provider exchanges **mono, signed 16-bit little-endian** PCM.
//! cpal delivers and consumes interleaved `f32`.  This module provides the
//! conversions in both directions:
//!
//! 1. [`downmix_to_mono`] averages interleaved channels into one.
//! 2. [`encode_s16le`] / [`decode_s16le`] convert `f32` ⇄ wire bytes.
//! 3. [`resample_linear`] converts rates when the output device does not
//!    run at the session rate.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// ```rust
/// use voice_demo::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// s16le codec
// ---------------------------------------------------------------------------

/// Encode `[-1.0, 1.0]` samples as signed 16-bit little-endian bytes.
///
/// Out-of-range samples are clamped rather than wrapped.
pub fn encode_s16le(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode signed 16-bit little-endian bytes into `f32` samples.
///
/// A trailing odd byte is ignored.
pub fn decode_s16le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` to `to_rate` Hz using linear
/// interpolation.
///
/// Returns the input unchanged when both rates are equal, and an empty
/// vector for empty input or a zero rate.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = match (samples.get(idx), samples.get(idx + 1)) {
            (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
            (Some(&a), None) => a,
            _ => 0.0,
        };
        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_is_passthrough() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn downmix_drops_incomplete_trailing_frame() {
        let input = vec![1.0_f32, -1.0, 0.5];
        let out = downmix_to_mono(&input, 2);
        assert_eq!(out.len(), 1);
        assert!(out[0].abs() < 1e-6);
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
        let bytes = encode_s16le(&[2.0, -2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -i16::MAX);
    }

    #[test]
    fn decode_ignores_trailing_odd_byte() {
        let mut bytes = encode_s16le(&[0.5, -0.25]);
        bytes.push(0x7f);
        let out = decode_s16le(&bytes);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.5).abs() < 1e-3);
        assert!((out[1] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample_linear(&input, 24_000, 24_000), input);
    }

    #[test]
    fn resample_down_and_up_lengths() {
        assert_eq!(resample_linear(&vec![0.5_f32; 480], 48_000, 16_000).len(), 160);
        assert_eq!(resample_linear(&vec![0.0_f32; 80], 8_000, 16_000).len(), 160);
    }

    #[test]
    fn resample_preserves_dc_level() {
        for s in resample_linear(&vec![0.5_f32; 441], 44_100, 48_000) {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn resample_zero_rate_is_empty() {
        assert!(resample_linear(&[0.1, 0.2], 0, 16_000).is_empty());
    }
}
