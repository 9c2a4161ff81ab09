use crate::models::config::MAX_SAMPLE_RATE;
use crate::models::error::CaptureError;

/// Lowest source sample rate accepted, in Hz.
pub const MIN_SOURCE_RATE: f64 = 1000.0;

/// Streaming linear-interpolation resampler for one source.
///
/// Input must already be in the graph's channel layout. The read position
/// and the last input frame carry over between calls, so consecutive
/// buffers resample as one continuous signal. A change of source rate
/// restarts the stream.
#[derive(Debug, Clone)]
pub struct Resampler {
    to_rate: f64,
    channels: usize,
    from_rate: Option<f64>,
    /// Input frames advanced per output frame.
    step: f64,
    /// Read position, where 0 is `previous` and 1 is the first new frame.
    position: f64,
    previous: Vec<f32>,
    primed: bool,
}

impl Resampler {
    pub fn new(to_rate: f64, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        Self {
            to_rate,
            channels,
            from_rate: None,
            step: 1.0,
            position: 0.0,
            previous: vec![0.0; channels],
            primed: false,
        }
    }

    /// Resample `samples` recorded at `from_rate` to the target rate.
    ///
    /// Fails for a rate outside `MIN_SOURCE_RATE..=MAX_SAMPLE_RATE`, which
    /// includes zero and non-finite rates. A trailing partial frame is
    /// ignored.
    pub fn process(&mut self, samples: &[f32], from_rate: f64) -> Result<Vec<f32>, CaptureError> {
        if !(MIN_SOURCE_RATE..=MAX_SAMPLE_RATE).contains(&from_rate) {
            return Err(CaptureError::InvalidSourceFormat(format!(
                "sample rate {}",
                from_rate
            )));
        }
        if self.from_rate != Some(from_rate) {
            self.reset();
            self.from_rate = Some(from_rate);
            self.step = from_rate / self.to_rate;
        }

        let ch = self.channels;
        let frames = samples.len() / ch;
        if (from_rate - self.to_rate).abs() < 0.01 {
            return Ok(samples[..frames * ch].to_vec());
        }
        if frames == 0 {
            return Ok(Vec::new());
        }

        if !self.primed {
            self.previous.copy_from_slice(&samples[..ch]);
            self.position = 1.0;
            self.primed = true;
        }

        let previous = &self.previous;
        let sample = |frame: usize, c: usize| {
            if frame == 0 {
                previous[c]
            } else {
                samples[(frame - 1) * ch + c]
            }
        };

        let mut position = self.position;
        let estimate = ((frames as f64 / self.step).ceil() as usize + 1) * ch;
        let mut output = Vec::with_capacity(estimate);
        while position < frames as f64 {
            let index = position as usize;
            let fraction = (position - index as f64) as f32;
            for c in 0..ch {
                let a = sample(index, c);
                let b = sample(index + 1, c);
                output.push(a + (b - a) * fraction);
            }
            position += self.step;
        }

        self.position = position - frames as f64;
        self.previous
            .copy_from_slice(&samples[(frames - 1) * ch..frames * ch]);
        Ok(output)
    }

    /// Forget carried state. The next buffer starts a new stream.
    pub fn reset(&mut self) {
        self.from_rate = None;
        self.step = 1.0;
        self.position = 0.0;
        self.previous.fill(0.0);
        self.primed = false;
    }
}
