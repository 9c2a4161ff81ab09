/// Circular buffer of interleaved audio frames.
///
/// Wrap in `Arc<parking_lot::Mutex<RingBuffer>>` to share between a source
/// callback and the render path.
///
/// Overflow behavior: drops the oldest whole frames and counts them.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Vec<f32>,
    channels: usize,
    write_index: usize,
    read_index: usize,
    available: usize,
    dropped_frames: u64,
}

/// Upper bound on frames a single buffer will allocate.
pub const MAX_CAPACITY_FRAMES: usize = 1 << 28;

impl RingBuffer {
    /// Create a buffer holding `capacity_frames` frames of `channels` samples.
    ///
    /// Capacity is clamped to `1..=MAX_CAPACITY_FRAMES`.
    pub fn new(capacity_frames: usize, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        let frames = capacity_frames.clamp(1, MAX_CAPACITY_FRAMES);
        Self {
            buffer: vec![0.0; frames * channels],
            channels,
            write_index: 0,
            read_index: 0,
            available: 0,
            dropped_frames: 0,
        }
    }

    /// Append interleaved samples. A trailing partial frame is ignored.
    ///
    /// If the write exceeds capacity, only the newest frames are kept.
    pub fn write(&mut self, samples: &[f32]) {
        let capacity = self.buffer.len();
        let whole = samples.len() - samples.len() % self.channels;
        if whole == 0 {
            return;
        }

        let mut samples = &samples[..whole];
        if samples.len() > capacity {
            self.dropped_frames += ((samples.len() - capacity) / self.channels) as u64;
            samples = &samples[samples.len() - capacity..];
        }

        let overflow = (self.available + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
            self.dropped_frames += (overflow / self.channels) as u64;
        }

        for &sample in samples {
            self.buffer[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % capacity;
        }
        self.available += samples.len();
    }

    /// Read and remove up to `frames` frames.
    pub fn read(&mut self, frames: usize) -> Vec<f32> {
        let to_read = (frames * self.channels).min(self.available);
        let capacity = self.buffer.len();

        let mut result = Vec::with_capacity(to_read);
        for i in 0..to_read {
            result.push(self.buffer[(self.read_index + i) % capacity]);
        }
        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        result
    }

    /// Read exactly `frames` frames, padding with silence when short.
    pub fn read_padded(&mut self, frames: usize) -> Vec<f32> {
        let mut samples = self.read(frames);
        samples.resize(frames * self.channels, 0.0);
        samples
    }

    pub fn frames_available(&self) -> usize {
        self.available / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Total frames discarded on overflow since creation.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }
}
