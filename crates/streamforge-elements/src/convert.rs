//! Format converter: the negotiation behavior described in the element
//! design (§4.4 "Property negotiation"), as a standalone pass-through/
//! relabel element sitting between a decoder and a sink.
//!
//! Presence of a key in a pad's property map is the whole of the
//! negotiation protocol: on the first frame, the converter reads the
//! *downstream* pad's accepted-format list and either becomes a pass-through
//! (if the incoming format is already accepted) or locks onto the first
//! accepted format as its conversion target. Actually remapping pixel or
//! sample data between formats is codec-glue territory (an external
//! collaborator per §1); this element demonstrates the negotiation contract
//! by relabeling the frame's declared format once negotiated, which is as
//! far as the core's responsibility goes.

use std::sync::Arc;

use parking_lot::Mutex;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::format::{PixelFormat, SampleFormat};
use streamforge_core::keys;
use streamforge_core::property::Property;
use streamforge_core::resource::{FrameKind, MediaFrame, Resource};
use streamforge_runtime::element::{Element, ElementDelegate};
use streamforge_runtime::factory::ElementFactoryEntry;
use streamforge_runtime::pad::Pad;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Negotiated {
    PassThrough,
    ToPixel(PixelFormat),
    ToSample(SampleFormat),
}

pub struct FormatConverter {
    negotiated: Mutex<Option<Negotiated>>,
}

impl FormatConverter {
    pub fn new(name: impl Into<String>) -> (Arc<Element>, Arc<FormatConverter>) {
        let conv = Arc::new(FormatConverter {
            negotiated: Mutex::new(None),
        });
        let elem = Element::new_non_threaded(name, conv.clone());
        elem.add_input("sink");
        elem.add_output("src");
        (elem, conv)
    }

    /// What this converter decided to do, once negotiation has happened.
    pub fn negotiated_pass_through(&self) -> Option<bool> {
        self.negotiated.lock().map(|n| n == Negotiated::PassThrough)
    }

    fn negotiate(&self, elem: &Element, frame: &MediaFrame) -> Negotiated {
        let Some(out) = elem.find_output("src") else {
            return Negotiated::PassThrough;
        };
        let Some(peer) = out.peer() else {
            return Negotiated::PassThrough;
        };

        match &frame.kind {
            FrameKind::Video { format, .. } => {
                let accepted = peer.property(keys::PIXEL_FORMAT_LIST);
                let current: Property = (*format).into();
                if accepted.contains(&current) {
                    return Negotiated::PassThrough;
                }
                match accepted.as_list().and_then(|l| l.first()) {
                    Some(Property::String(tag)) => match PixelFormat::from_tag(tag) {
                        Some(target) => Negotiated::ToPixel(target),
                        None => Negotiated::PassThrough,
                    },
                    _ => Negotiated::PassThrough,
                }
            }
            FrameKind::Audio { format, .. } => {
                let accepted = peer.property(keys::SAMPLE_FORMAT_LIST);
                let current: Property = (*format).into();
                if accepted.contains(&current) {
                    return Negotiated::PassThrough;
                }
                match accepted.as_list().and_then(|l| l.first()) {
                    Some(Property::String(tag)) => match SampleFormat::from_tag(tag) {
                        Some(target) => Negotiated::ToSample(target),
                        None => Negotiated::PassThrough,
                    },
                    _ => Negotiated::PassThrough,
                }
            }
        }
    }

    fn apply(&self, mode: Negotiated, mut frame: MediaFrame) -> MediaFrame {
        match mode {
            Negotiated::PassThrough => frame,
            Negotiated::ToPixel(target) => {
                if let FrameKind::Video { width, height, .. } = frame.kind {
                    frame.kind = FrameKind::Video {
                        format: target,
                        width,
                        height,
                    };
                }
                frame
            }
            Negotiated::ToSample(target) => {
                if let FrameKind::Audio {
                    sample_rate,
                    channels,
                    sample_count,
                    ..
                } = frame.kind
                {
                    frame.kind = FrameKind::Audio {
                        format: target,
                        sample_rate,
                        channels,
                        sample_count,
                    };
                }
                frame
            }
        }
    }
}

impl ElementDelegate for FormatConverter {
    fn on_sink_push(&self, elem: &Element, _pad: &Pad, resource: Resource) -> Result<()> {
        let frame = match resource {
            Resource::Frame(f) => f,
            Resource::Packet(p) => {
                // Nothing to negotiate on compressed data; forward untouched.
                return elem
                    .find_output("src")
                    .map(|out| out.push(Resource::Packet(p)))
                    .unwrap_or(Err(Error::NoLink));
            }
        };

        let mode = {
            let mut negotiated = self.negotiated.lock();
            match *negotiated {
                Some(m) => m,
                None => {
                    let m = self.negotiate(elem, &frame);
                    *negotiated = Some(m);
                    m
                }
            }
        };

        let out_frame = self.apply(mode, frame);
        elem.find_output("src")
            .map(|out| out.push(out_frame.into()))
            .unwrap_or(Err(Error::NoLink))
    }

    fn on_sink_event(&self, elem: &Element, _pad: &Pad, event: &Event) -> Result<()> {
        if let Event::FlushRequested { .. } | Event::SeekRequested { .. } = event {
            // Renegotiate after a seek/flush in case the source changed.
            *self.negotiated.lock() = None;
        }
        elem.push_event_to_downstream(event.clone())
    }
}

fn construct(name: &str) -> Arc<Element> {
    FormatConverter::new(name).0
}

inventory::submit! {
    ElementFactoryEntry {
        type_name: "streamforge.convert",
        constructor: construct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::property::Property;
    use streamforge_core::state::State;
    use streamforge_runtime::pad::{Pad, PadKind};

    fn video_frame(format: PixelFormat) -> MediaFrame {
        MediaFrame::video(format, 4, 4, vec![vec![0u8; 4]])
    }

    fn sink_stub(accepted: Vec<&str>) -> Pad {
        let pad = Pad::new("sink-stub", PadKind::Input, "in");
        pad.add_property(
            keys::PIXEL_FORMAT_LIST,
            Property::List(accepted.into_iter().map(|t| Property::String(t.to_owned())).collect()),
        );
        pad.set_callback(|_| Ok(()));
        pad
    }

    #[test]
    fn pass_through_when_format_already_accepted() {
        let (elem, conv) = FormatConverter::new("c");
        elem.set_state(State::Running).unwrap();
        let downstream = sink_stub(vec!["rgba", "bgra"]);
        elem.find_output("src").unwrap().link(&downstream).unwrap();

        conv.on_sink_push(&elem, &elem.find_input("sink").unwrap(), video_frame(PixelFormat::RGBA).into())
            .unwrap();

        assert_eq!(conv.negotiated_pass_through(), Some(true));
    }

    #[test]
    fn converts_to_first_accepted_format_when_unsupported() {
        let (elem, conv) = FormatConverter::new("c");
        elem.set_state(State::Running).unwrap();
        let downstream = sink_stub(vec!["nv12"]);
        elem.find_output("src").unwrap().link(&downstream).unwrap();

        conv.on_sink_push(&elem, &elem.find_input("sink").unwrap(), video_frame(PixelFormat::RGBA).into())
            .unwrap();

        assert_eq!(conv.negotiated_pass_through(), Some(false));
    }

    #[test]
    fn seek_clears_negotiation_state() {
        let (elem, conv) = FormatConverter::new("c");
        elem.set_state(State::Running).unwrap();
        let downstream = sink_stub(vec!["rgba"]);
        elem.find_output("src").unwrap().link(&downstream).unwrap();
        conv.on_sink_push(&elem, &elem.find_input("sink").unwrap(), video_frame(PixelFormat::RGBA).into())
            .unwrap();
        assert!(conv.negotiated_pass_through().is_some());

        conv.on_sink_event(
            &elem,
            &elem.find_input("sink").unwrap(),
            &Event::SeekRequested {
                position_secs: 1.0,
                ticks: 0,
            },
        )
        .unwrap();
        assert!(conv.negotiated_pass_through().is_none());
    }
}
