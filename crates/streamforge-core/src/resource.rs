//! Payloads that flow across pads: compressed packets and decoded frames.
//!
//! Both are plain owned structs behind `Arc` rather than trait objects —
//! there is exactly one packet shape and one frame shape in this crate (no
//! polymorphic subclassing needed the way the original's virtual
//! `MediaFrame`/`MediaPacket` allowed for codec-specific backing storage).
//! A decoder that wraps an external codec library's own frame type converts
//! into `MediaFrame` at the pad boundary.

use std::sync::Arc;

use crate::format::{PixelFormat, SampleFormat};

/// Compressed bytes produced by a demuxer and consumed by a decoder.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    pub stream_index: usize,
    pub timestamp_secs: f64,
    pub duration_secs: f64,
    pub data: Arc<Vec<u8>>,
    pub is_keyframe: bool,
}

impl MediaPacket {
    pub fn new(stream_index: usize, timestamp_secs: f64, duration_secs: f64, data: Vec<u8>) -> Self {
        MediaPacket {
            stream_index,
            timestamp_secs,
            duration_secs,
            data: Arc::new(data),
            is_keyframe: false,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Decoded media: either planar/packed video pixels or audio samples.
///
/// Frames are reference-counted; any element holding a clone may treat it as
/// read-only. `make_writable` performs copy-on-write only when needed.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    pub kind: FrameKind,
    pub timestamp_secs: f64,
    pub duration_secs: f64,
    pub planes: Arc<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Video {
        format: PixelFormat,
        width: u32,
        height: u32,
    },
    Audio {
        format: SampleFormat,
        sample_rate: u32,
        channels: u32,
        sample_count: u32,
    },
}

impl MediaFrame {
    pub fn video(format: PixelFormat, width: u32, height: u32, planes: Vec<Vec<u8>>) -> Self {
        MediaFrame {
            kind: FrameKind::Video { format, width, height },
            timestamp_secs: 0.0,
            duration_secs: 0.0,
            planes: Arc::new(planes),
        }
    }

    pub fn audio(
        format: SampleFormat,
        sample_rate: u32,
        channels: u32,
        sample_count: u32,
        planes: Vec<Vec<u8>>,
    ) -> Self {
        MediaFrame {
            kind: FrameKind::Audio {
                format,
                sample_rate,
                channels,
                sample_count,
            },
            timestamp_secs: 0.0,
            duration_secs: 0.0,
            planes: Arc::new(planes),
        }
    }

    pub fn with_timing(mut self, timestamp_secs: f64, duration_secs: f64) -> Self {
        self.timestamp_secs = timestamp_secs;
        self.duration_secs = duration_secs;
        self
    }

    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(|v| v.as_slice())
    }

    /// Number of other handles sharing this frame's backing storage.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.planes)
    }

    /// Copy-on-write: if this frame's planes are uniquely owned, returns
    /// `self` unchanged; otherwise clones the backing storage so the caller
    /// can mutate it without affecting other holders.
    pub fn make_writable(&mut self) -> &mut Vec<Vec<u8>> {
        if Arc::strong_count(&self.planes) > 1 {
            self.planes = Arc::new((*self.planes).clone());
        }
        Arc::get_mut(&mut self.planes).expect("uniquely owned after copy-on-write")
    }
}

/// Anything that can travel across a pad link. Pads are generic over this
/// type rather than over `MediaPacket`/`MediaFrame` individually, since a
/// single sink pad (e.g. a queue's input) accepts either depending on where
/// it sits in the graph.
#[derive(Debug, Clone)]
pub enum Resource {
    Packet(MediaPacket),
    Frame(MediaFrame),
}

impl Resource {
    pub fn timestamp_secs(&self) -> f64 {
        match self {
            Resource::Packet(p) => p.timestamp_secs,
            Resource::Frame(f) => f.timestamp_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        match self {
            Resource::Packet(p) => p.duration_secs,
            Resource::Frame(f) => f.duration_secs,
        }
    }

    pub fn as_frame(&self) -> Option<&MediaFrame> {
        match self {
            Resource::Frame(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_packet(&self) -> Option<&MediaPacket> {
        match self {
            Resource::Packet(p) => Some(p),
            _ => None,
        }
    }
}

impl From<MediaPacket> for Resource {
    fn from(p: MediaPacket) -> Self {
        Resource::Packet(p)
    }
}
impl From<MediaFrame> for Resource {
    fn from(f: MediaFrame) -> Self {
        Resource::Frame(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_writable_clones_only_when_shared() {
        let mut frame = MediaFrame::video(PixelFormat::RGBA, 2, 2, vec![vec![0u8; 16]]);
        let clone = frame.clone();
        assert_eq!(frame.share_count(), 2);

        frame.make_writable()[0][0] = 42;
        assert_eq!(frame.share_count(), 1);
        assert_eq!(clone.plane(0).unwrap()[0], 0, "original holder unaffected");
    }

    #[test]
    fn make_writable_is_noop_when_unique() {
        let mut frame = MediaFrame::video(PixelFormat::RGBA, 2, 2, vec![vec![0u8; 16]]);
        let before = Arc::as_ptr(&frame.planes);
        frame.make_writable()[0][0] = 7;
        assert_eq!(Arc::as_ptr(&frame.planes), before);
    }
}
