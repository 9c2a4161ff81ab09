pub mod mixer;
pub mod resampler;
pub mod ring_buffer;
