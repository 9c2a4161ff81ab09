use crate::models::error::CaptureError;
use crate::processing::resampler::Resampler;

/// Pure-math pass-through mixer and format converter.
///
/// All operations work on interleaved `&[f32]` buffers with no platform
/// dependencies. Sources are conformed to the graph format (channel count
/// and sample rate) on arrival, then summed per render quantum.
#[derive(Debug, Clone)]
pub struct Mixer {
    pub target_sample_rate: f64,
    pub channels: u16,
}

impl Mixer {
    pub fn new(target_sample_rate: f64, channels: u16) -> Self {
        Self {
            target_sample_rate,
            channels: channels.max(1),
        }
    }

    /// Per-source resampler targeting the graph format.
    pub fn resampler(&self) -> Resampler {
        Resampler::new(self.target_sample_rate, self.channels)
    }

    /// Convert a source buffer to the graph's channel layout and sample rate.
    ///
    /// `resampler` carries the source's position between buffers; keep one
    /// per source.
    pub fn conform(
        &self,
        resampler: &mut Resampler,
        samples: &[f32],
        source_sample_rate: f64,
        source_channels: u16,
    ) -> Result<Vec<f32>, CaptureError> {
        let remapped = Self::remap_channels(samples, source_channels.max(1), self.channels);
        resampler.process(&remapped, source_sample_rate)
    }

    /// Change the channel count of interleaved audio.
    ///
    /// Mono is duplicated to every output channel; any layout folds to mono
    /// by averaging. Otherwise channels are copied by position and missing
    /// ones are silent.
    pub fn remap_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
        if from == to {
            return samples.to_vec();
        }
        let from = from as usize;
        let to = to as usize;
        let frame_count = samples.len() / from;
        let mut output = Vec::with_capacity(frame_count * to);

        for frame in samples.chunks_exact(from) {
            if to == 1 {
                let sum: f32 = frame.iter().sum();
                output.push(sum / from as f32);
            } else if from == 1 {
                output.extend(std::iter::repeat(frame[0]).take(to));
            } else {
                output.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
            }
        }
        output
    }

    /// Add `input` into `mix` sample by sample. Extra input samples are ignored.
    pub fn accumulate(mix: &mut [f32], input: &[f32]) {
        for (out, sample) in mix.iter_mut().zip(input) {
            *out += sample;
        }
    }

    /// Clamp a finished mix to `[-1.0, 1.0]`.
    pub fn clamp(mix: &mut [f32]) {
        for sample in mix.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Compute RMS level of samples (0.0–1.0 range for normalized audio).
    pub fn rms_level(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Compute peak absolute level of samples.
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let out = Mixer::remap_channels(&[0.25, -0.5], 1, 2);
        assert_eq!(out, vec![0.25, 0.25, -0.5, -0.5]);
    }

    #[test]
    fn stereo_folds_to_mono_by_average() {
        let out = Mixer::remap_channels(&[0.2, 0.4, -1.0, 1.0], 2, 1);
        assert_abs_diff_eq!(out[0], 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn surround_keeps_front_pair() {
        let frame = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        assert_eq!(Mixer::remap_channels(&frame, 6, 2), vec![0.1, 0.2]);
    }

    #[test]
    fn conform_same_format_is_passthrough() {
        let mixer = Mixer::new(48000.0, 2);
        let mut resampler = mixer.resampler();
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(mixer.conform(&mut resampler, &samples, 48000.0, 2).unwrap(), samples);
    }

    #[test]
    fn conform_mono_24k_to_stereo_48k() {
        let mixer = Mixer::new(48000.0, 2);
        let mut resampler = mixer.resampler();
        let mono = vec![0.5f32; 100];

        let mut out = mixer.conform(&mut resampler, &mono, 24000.0, 1).unwrap();
        out.extend(mixer.conform(&mut resampler, &mono, 24000.0, 1).unwrap());

        assert_eq!(out.len(), 398 * 2);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn conform_rejects_zero_rate() {
        let mixer = Mixer::new(48000.0, 2);
        let mut resampler = mixer.resampler();
        let err = mixer.conform(&mut resampler, &[0.1, 0.1], 0.0, 2).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidSourceFormat(_)));
    }

    #[test]
    fn accumulate_sums_and_clamp_limits() {
        let mut mix = vec![0.0f32; 3];
        Mixer::accumulate(&mut mix, &[0.6, -0.2, 0.1]);
        Mixer::accumulate(&mut mix, &[0.6, -0.2, 0.1, 9.0]);
        Mixer::clamp(&mut mix);

        assert_abs_diff_eq!(mix[0], 1.0);
        assert_abs_diff_eq!(mix[1], -0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(mix[2], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn levels_of_silence_and_full_scale() {
        assert_eq!(Mixer::rms_level(&[0.0, 0.0]), 0.0);
        assert_eq!(Mixer::rms_level(&[]), 0.0);
        assert_abs_diff_eq!(Mixer::rms_level(&[1.0, -1.0]), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(Mixer::peak_level(&[0.1, -0.5, 0.3]), 0.5);
    }
}
