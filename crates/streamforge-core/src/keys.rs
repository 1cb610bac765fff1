//! Stable pad property key names.
//!
//! Elements read and write these strings in their pad property maps during
//! negotiation; keeping them as named constants avoids typos scattering
//! silent negotiation failures across the codebase.

pub const PIXEL_FORMAT: &str = "PixelFormat";
pub const PIXEL_FORMAT_LIST: &str = "PixelFormatList";
pub const SAMPLE_FORMAT: &str = "SampleFormat";
pub const SAMPLE_FORMAT_LIST: &str = "SampleFormatList";
pub const SAMPLE_RATE: &str = "SampleRate";
pub const CHANNELS: &str = "Channels";
pub const WIDTH: &str = "Width";
pub const HEIGHT: &str = "Height";
pub const DURATION: &str = "Duration";
pub const METADATA: &str = "Metadata";
pub const TITLE: &str = "Title";
pub const HTTP_USER_AGENT: &str = "HttpUserAgent";
pub const HTTP_REFERER: &str = "HttpReferer";
