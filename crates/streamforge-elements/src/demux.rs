//! Demuxer: specified here as the `Demuxer` trait plus `TestSource`, a
//! minimal in-process fake that plays back a pre-built packet script. A
//! real FFmpeg/libav-style binding is an external collaborator out of this
//! crate's scope (§1); this module only pins down the *observable* behavior
//! §4.10 describes: one output pad per stream, populated pad properties,
//! and the seek → backward-keyframe-seek → downstream-flush protocol.

use std::collections::BTreeMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use std::sync::Arc;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::property::Property;
use streamforge_core::resource::MediaPacket;
use streamforge_runtime::element::{Element, ElementDelegate};
use streamforge_runtime::factory::ElementFactoryEntry;
use streamforge_runtime::time::ticks;

/// Static description of one elementary stream a demuxer exposes, known
/// before the first packet is read (mirrors what a real demuxer gets from
/// the container's header).
#[derive(Clone)]
pub struct StreamInfo {
    pub stream_index: usize,
    pub pad_name: String,
    pub properties: BTreeMap<String, Property>,
}

impl StreamInfo {
    pub fn new(stream_index: usize, pad_name: impl Into<String>) -> StreamInfo {
        StreamInfo {
            stream_index,
            pad_name: pad_name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Property>) -> StreamInfo {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Observable behavior a demuxer provides: the list of streams it exposes,
/// pulling the next packet, and seeking.
pub trait Demuxer: Send + Sync {
    fn streams(&self) -> Vec<StreamInfo>;

    /// Returns the next packet, or `None` once the source is exhausted.
    fn read_packet(&self) -> Result<Option<MediaPacket>>;

    /// Seek to the nearest keyframe at or before `position_secs`.
    fn seek(&self, position_secs: f64) -> Result<()>;
}

/// An in-memory demuxer fake: plays back a fixed script of packets in
/// order, treating any packet with `is_keyframe` as a valid seek target.
pub struct TestSource {
    streams: Vec<StreamInfo>,
    script: Vec<MediaPacket>,
    cursor: StdMutex<usize>,
}

impl TestSource {
    pub fn new(streams: Vec<StreamInfo>, script: Vec<MediaPacket>) -> Arc<TestSource> {
        Arc::new(TestSource {
            streams,
            script,
            cursor: StdMutex::new(0),
        })
    }
}

impl Demuxer for TestSource {
    fn streams(&self) -> Vec<StreamInfo> {
        self.streams.clone()
    }

    fn read_packet(&self) -> Result<Option<MediaPacket>> {
        let mut cursor = self.cursor.lock().unwrap();
        match self.script.get(*cursor) {
            Some(packet) => {
                *cursor += 1;
                Ok(Some(packet.clone()))
            }
            None => Ok(None),
        }
    }

    fn seek(&self, position_secs: f64) -> Result<()> {
        let mut cursor = self.cursor.lock().unwrap();
        // Backward keyframe seek: the last keyframe at or before the target.
        let target = self.script[..]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, p)| p.is_keyframe && p.timestamp_secs <= position_secs)
            .map(|(i, _)| i)
            .unwrap_or(0);
        *cursor = target;
        Ok(())
    }
}

/// Threaded element whose loop reads packets and routes them to the output
/// pad matching their stream index.
pub struct DemuxerSource {
    demuxer: Arc<dyn Demuxer>,
    eof_sent: std::sync::atomic::AtomicBool,
}

impl DemuxerSource {
    pub fn new(name: impl Into<String>, demuxer: Arc<dyn Demuxer>) -> Arc<Element> {
        let source = Arc::new(DemuxerSource {
            demuxer,
            eof_sent: std::sync::atomic::AtomicBool::new(false),
        });
        let elem = Element::new_threaded(name, source.clone());
        for stream in source.demuxer.streams() {
            let pad = elem.add_output(stream.pad_name.clone());
            for (key, value) in stream.properties {
                pad.add_property(key, value);
            }
        }
        elem
    }

    fn pad_for_stream(elem: &Element, stream_index: usize, streams: &[StreamInfo]) -> Option<String> {
        streams
            .iter()
            .find(|s| s.stream_index == stream_index)
            .map(|s| s.pad_name.clone())
            .filter(|name| elem.find_output(name).is_some())
    }
}

impl ElementDelegate for DemuxerSource {
    fn on_event(&self, elem: &Element, event: &Event) -> Result<()> {
        match event {
            Event::SeekRequested { position_secs, .. } => {
                self.demuxer.seek(*position_secs)?;
                self.eof_sent.store(false, std::sync::atomic::Ordering::Release);
                elem.push_event_to_downstream(Event::FlushRequested {
                    sender: elem.name().to_owned(),
                    ticks: ticks(),
                })
            }
            _ => Err(Error::NoImpl),
        }
    }

    fn on_loop(&self, elem: &Element) -> Result<()> {
        match self.demuxer.read_packet()? {
            Some(packet) => {
                let streams = self.demuxer.streams();
                if let Some(pad_name) = Self::pad_for_stream(elem, packet.stream_index, &streams) {
                    if let Some(pad) = elem.find_output(&pad_name) {
                        if let Err(e) = pad.push(packet.into()) {
                            if e != Error::NoLink {
                                return Err(e);
                            }
                        }
                    }
                }
                Ok(())
            }
            None => {
                if !self.eof_sent.swap(true, std::sync::atomic::Ordering::AcqRel) {
                    if let Some(bus) = elem.bus() {
                        bus.post_message(Event::MediaEndOfFile {
                            sender: elem.name().to_owned(),
                            ticks: ticks(),
                        });
                    }
                }
                if let Some(thread) = elem.thread() {
                    thread.wait_task(Some(Duration::from_millis(100)));
                }
                Ok(())
            }
        }
    }
}

fn construct(name: &str) -> Arc<Element> {
    let streams = vec![StreamInfo::new(0, "video0")];
    DemuxerSource::new(name, TestSource::new(streams, Vec::new()))
}

inventory::submit! {
    ElementFactoryEntry {
        type_name: "streamforge.testsource",
        constructor: construct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::keys;
    use streamforge_core::state::State;
    use streamforge_runtime::pad::{Pad, PadKind};

    fn packet(stream: usize, pts: f64, keyframe: bool) -> MediaPacket {
        let mut p = MediaPacket::new(stream, pts, 0.04, vec![0u8; 4]);
        p.is_keyframe = keyframe;
        p
    }

    #[test]
    fn pads_are_created_with_declared_properties() {
        let streams = vec![StreamInfo::new(0, "video0").with_property(keys::WIDTH, 1920i64)];
        let elem = DemuxerSource::new("src", TestSource::new(streams, Vec::new()));
        let pad = elem.find_output("video0").unwrap();
        assert_eq!(pad.property(keys::WIDTH).to_int(), 1920);
    }

    #[test]
    fn packets_route_to_matching_stream_pad() {
        let streams = vec![StreamInfo::new(0, "video0")];
        let script = vec![packet(0, 0.0, true), packet(0, 0.04, false)];
        let elem = DemuxerSource::new("src", TestSource::new(streams, script));

        let sink = Pad::new("sink-stub", PadKind::Input, "in");
        let received = Arc::new(StdMutex::new(Vec::new()));
        let r2 = received.clone();
        sink.set_callback(move |res| {
            r2.lock().unwrap().push(res.timestamp_secs());
            Ok(())
        });
        elem.find_output("video0").unwrap().link(&sink).unwrap();

        elem.set_state(State::Running).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        elem.set_state(State::Null).unwrap();

        let pts: Vec<f64> = received.lock().unwrap().clone();
        assert_eq!(pts, vec![0.0, 0.04]);
    }

    #[test]
    fn seek_flushes_downstream_and_rewinds_to_keyframe() {
        let streams = vec![StreamInfo::new(0, "video0")];
        let script = vec![
            packet(0, 0.0, true),
            packet(0, 1.0, false),
            packet(0, 2.0, true),
            packet(0, 3.0, false),
        ];
        let elem = DemuxerSource::new("src", TestSource::new(streams, script));

        let sink = Pad::new("sink-stub", PadKind::Input, "in");
        let flushes = Arc::new(StdMutex::new(0));
        let f2 = flushes.clone();
        sink.set_event_callback(move |event| {
            if matches!(event, Event::FlushRequested { .. }) {
                *f2.lock().unwrap() += 1;
            }
            Ok(())
        });
        elem.find_output("video0").unwrap().link(&sink).unwrap();

        elem.send_event(Event::SeekRequested {
            position_secs: 2.5,
            ticks: 0,
        })
        .unwrap();

        assert_eq!(*flushes.lock().unwrap(), 1);
    }
}
