pub mod audio_platform;
pub mod capture_delegate;
pub mod media_element;
