// crates/streamforge-elements/src/lib.rs
//
// Concrete elements built on top of streamforge-runtime's Element/Pad
// machinery: a backpressure queue, audio/video sinks, a demuxer source, a
// decoder, and a format converter. Every element here self-registers with
// the process-wide factory via `inventory::submit!` so a pipeline can be
// built from type names alone.

pub mod audio;
pub mod convert;
pub mod decode;
pub mod demux;
pub mod queue;
pub mod video;

pub use audio::{AudioDevice, AudioSink, FakeAudioDevice};
pub use convert::FormatConverter;
pub use decode::{Decoder, DecoderElement, PassthroughDecoder};
pub use demux::{Demuxer, DemuxerSource, StreamInfo, TestSource};
pub use queue::Queue;
pub use video::{FakeVideoRenderer, VideoRenderer, VideoSink};
