//! Decoder: specified here as the `Decoder` trait plus `PassthroughDecoder`,
//! an in-process fake standing in for a real FFmpeg/libav-style binding
//! (an external collaborator per §1, out of this crate's scope). The fake
//! turns each packet's bytes directly into a frame of a fixed, declared
//! `FrameKind` — enough to exercise the pad-graph and flush protocol in
//! tests and the demonstration binary without linking a real codec.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::resource::{FrameKind, MediaFrame, MediaPacket, Resource};
use streamforge_runtime::element::{Element, ElementDelegate};
use streamforge_runtime::factory::ElementFactoryEntry;
use streamforge_runtime::pad::Pad;

/// Observable behavior a decoder provides: turn a packet into zero-or-one
/// frames (zero while buffering, e.g. waiting on a B-frame's reference),
/// and flush any held-back state without emitting a frame.
pub trait Decoder: Send + Sync {
    fn decode(&self, packet: &MediaPacket) -> Result<Option<MediaFrame>>;
    fn flush(&self);
}

/// Wraps every packet's bytes directly into a frame of `kind`, with no
/// actual bitstream decoding — a stand-in for tests and the headless demo.
pub struct PassthroughDecoder {
    kind: FrameKind,
    flushed: AtomicBool,
}

impl PassthroughDecoder {
    pub fn new(kind: FrameKind) -> Arc<PassthroughDecoder> {
        Arc::new(PassthroughDecoder {
            kind,
            flushed: AtomicBool::new(false),
        })
    }

    pub fn was_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }
}

impl Decoder for PassthroughDecoder {
    fn decode(&self, packet: &MediaPacket) -> Result<Option<MediaFrame>> {
        self.flushed.store(false, Ordering::Release);
        let frame = MediaFrame {
            kind: self.kind.clone(),
            timestamp_secs: packet.timestamp_secs,
            duration_secs: packet.duration_secs,
            planes: Arc::new(vec![(*packet.data).clone()]),
        };
        Ok(Some(frame))
    }

    fn flush(&self) {
        self.flushed.store(true, Ordering::Release);
    }
}

/// Non-threaded element: packets arrive on `sink` and are decoded
/// synchronously on the calling (upstream) thread, same as the original's
/// CPU-bound decode step.
pub struct DecoderElement {
    decoder: Arc<dyn Decoder>,
}

impl DecoderElement {
    pub fn new(name: impl Into<String>, decoder: Arc<dyn Decoder>) -> (Arc<Element>, Arc<DecoderElement>) {
        let delegate = Arc::new(DecoderElement { decoder });
        let elem = Element::new_non_threaded(name, delegate.clone());
        elem.add_input("sink");
        elem.add_output("src");
        (elem, delegate)
    }
}

impl ElementDelegate for DecoderElement {
    fn on_sink_push(&self, elem: &Element, _pad: &Pad, resource: Resource) -> Result<()> {
        let packet = match resource {
            Resource::Packet(p) => p,
            Resource::Frame(_) => return Err(Error::UnsupportedResource),
        };
        match self.decoder.decode(&packet)? {
            Some(frame) => elem
                .find_output("src")
                .map(|out| out.push(frame.into()))
                .unwrap_or(Err(Error::NoLink)),
            None => Ok(()),
        }
    }

    fn on_sink_event(&self, elem: &Element, _pad: &Pad, event: &Event) -> Result<()> {
        match event {
            Event::FlushRequested { .. } | Event::SeekRequested { .. } => {
                self.decoder.flush();
                elem.push_event_to_downstream(event.clone())
            }
            _ => Err(Error::NoImpl),
        }
    }
}

fn construct(name: &str) -> Arc<Element> {
    let kind = FrameKind::Video {
        format: streamforge_core::format::PixelFormat::RGBA,
        width: 0,
        height: 0,
    };
    DecoderElement::new(name, PassthroughDecoder::new(kind)).0
}

inventory::submit! {
    ElementFactoryEntry {
        type_name: "streamforge.passthroughdecoder",
        constructor: construct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::format::PixelFormat;
    use streamforge_core::state::State;
    use streamforge_runtime::pad::{Pad, PadKind};

    fn video_kind() -> FrameKind {
        FrameKind::Video {
            format: PixelFormat::RGBA,
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn packet_decodes_to_frame_with_matching_timing() {
        let (elem, _decoder) = DecoderElement::new("d", PassthroughDecoder::new(video_kind()));
        elem.set_state(State::Running).unwrap();

        let downstream = Pad::new("sink-stub", PadKind::Input, "in");
        let received = Arc::new(parking_lot::Mutex::new(None));
        let r2 = received.clone();
        downstream.set_callback(move |res| {
            *r2.lock() = Some(res);
            Ok(())
        });
        elem.find_output("src").unwrap().link(&downstream).unwrap();

        let upstream = Pad::new("src-stub", PadKind::Output, "out");
        upstream.link(&elem.find_input("sink").unwrap()).unwrap();
        let packet = MediaPacket::new(0, 1.5, 0.04, vec![9, 9, 9, 9]);
        upstream.push(packet.into()).unwrap();

        let frame = received.lock().take().unwrap();
        assert_eq!(frame.as_frame().unwrap().timestamp_secs, 1.5);
        elem.set_state(State::Null).unwrap();
    }

    #[test]
    fn flush_resets_decoder_without_emitting_frame() {
        let decoder = PassthroughDecoder::new(video_kind());
        let (elem, _delegate) = DecoderElement::new("d", decoder.clone());
        elem.set_state(State::Running).unwrap();

        let downstream = Pad::new("sink-stub", PadKind::Input, "in");
        let flushes = Arc::new(std::sync::Mutex::new(0));
        let f2 = flushes.clone();
        downstream.set_event_callback(move |event| {
            if matches!(event, Event::FlushRequested { .. }) {
                *f2.lock().unwrap() += 1;
            }
            Ok(())
        });
        let received = Arc::new(parking_lot::Mutex::new(false));
        let r2 = received.clone();
        downstream.set_callback(move |_| {
            *r2.lock() = true;
            Ok(())
        });
        elem.find_output("src").unwrap().link(&downstream).unwrap();

        let upstream = Pad::new("src-stub", PadKind::Output, "out");
        upstream.link(&elem.find_input("sink").unwrap()).unwrap();
        upstream
            .push_event(Event::FlushRequested {
                sender: "t".into(),
                ticks: 0,
            })
            .unwrap();

        assert_eq!(*flushes.lock().unwrap(), 1);
        assert!(!*received.lock());
        assert!(decoder.was_flushed());
        elem.set_state(State::Null).unwrap();
    }
}
