//! Reference video sink: a threaded element that paces frames against the
//! pipeline's master clock and hands them to an injected renderer.
//!
//! The real GPU/window-system presenter is an external collaborator (§1);
//! this module defines only the `VideoRenderer` trait it is expected to
//! implement, plus an in-memory `FakeVideoRenderer` that records frames for
//! tests and the headless demonstration binary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::resource::{MediaFrame, Resource};
use streamforge_core::state::State;
use streamforge_runtime::clock::MediaController;
use streamforge_runtime::element::{Element, ElementDelegate};
use streamforge_runtime::factory::ElementFactoryEntry;
use streamforge_runtime::pad::Pad;

/// How far behind the master clock a frame may be before it's shown late
/// rather than dropped. Frames more than this far behind are dropped.
const DROP_THRESHOLD_SECS: f64 = 0.300;

/// Frames up to this far *ahead* of the master clock make the sink wait;
/// anything further ahead than this is presumably a clock discontinuity
/// (e.g. a seek in flight) so the sink shows it immediately instead.
const MAX_WAIT_AHEAD_SECS: f64 = 10.0;
const MIN_WAIT_SECS: f64 = 0.010;

/// Upper bound on a single `cv.wait_for` call while pacing a frame. The wait
/// is re-issued in slices this long so a flush or a state change away from
/// `Running` is noticed within one slice instead of only after the full
/// (up to `MAX_WAIT_AHEAD_SECS`) pacing delay elapses.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// How many dropped frames in a row before the sink logs a warning.
const DROP_WARN_THRESHOLD: u64 = 10;

/// The external window-system/GPU presenter. A real backend uploads
/// `frame`'s planes to a texture and blits it; this crate ships only the
/// trait and a recording fake.
pub trait VideoRenderer: Send + Sync {
    fn render(&self, frame: &MediaFrame);
}

/// Records every frame handed to it, for tests and the demonstration binary.
pub struct FakeVideoRenderer {
    frames: Mutex<Vec<MediaFrame>>,
}

impl FakeVideoRenderer {
    pub fn new() -> Arc<FakeVideoRenderer> {
        Arc::new(FakeVideoRenderer {
            frames: Mutex::new(Vec::new()),
        })
    }

    pub fn rendered_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.frames.lock().last().map(|f| f.timestamp_secs)
    }
}

impl VideoRenderer for FakeVideoRenderer {
    fn render(&self, frame: &MediaFrame) {
        self.frames.lock().push(frame.clone());
    }
}

struct QueueState {
    items: VecDeque<MediaFrame>,
    /// Bumped on every flush so a thread sleeping on `cv` can tell whether
    /// the frame it was pacing got flushed out from under it.
    generation: u64,
}

pub struct VideoSink {
    renderer: Arc<dyn VideoRenderer>,
    state: Mutex<QueueState>,
    cv: Condvar,
    dropped: AtomicUsize,
}

impl VideoSink {
    pub fn new(name: impl Into<String>, renderer: Arc<dyn VideoRenderer>) -> (Arc<Element>, Arc<VideoSink>) {
        let sink = Arc::new(VideoSink {
            renderer,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                generation: 0,
            }),
            cv: Condvar::new(),
            dropped: AtomicUsize::new(0),
        });
        let elem = Element::new_threaded(name, sink.clone());
        elem.add_input("sink");
        (elem, sink)
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn queued_count(&self) -> usize {
        self.state.lock().items.len()
    }

    fn controller(&self, elem: &Element) -> Option<Arc<MediaController>> {
        elem.context()?.query_object::<MediaController>()
    }

    /// Pop the next queued frame, waiting briefly if none is ready yet so
    /// the loop still observes state changes promptly.
    fn pop_or_wait(&self) -> Option<MediaFrame> {
        let mut state = self.state.lock();
        if state.items.is_empty() {
            self.cv.wait_for(&mut state, Duration::from_millis(50));
        }
        state.items.pop_front()
    }

    /// Sleep for `duration` in `WAIT_SLICE`-sized chunks, returning `true` if
    /// the caller should drop the frame instead of rendering it: either a
    /// flush landed on this frame's queue while sleeping, or the element
    /// left `Running` (paused or stopped) partway through the wait.
    fn wait_for_pts(&self, elem: &Element, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            let mut state = self.state.lock();
            let generation_at_start = state.generation;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.cv.wait_for(&mut state, remaining.min(WAIT_SLICE));
            if state.generation != generation_at_start {
                return true;
            }
            drop(state);
            if elem.state() != State::Running {
                return true;
            }
        }
    }

    fn flush(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.generation += 1;
        self.cv.notify_all();
    }
}

impl ElementDelegate for VideoSink {
    fn on_sink_push(&self, _elem: &Element, _pad: &Pad, resource: Resource) -> Result<()> {
        let frame = match resource {
            Resource::Frame(f) => f,
            Resource::Packet(_) => return Err(Error::UnsupportedResource),
        };
        let mut state = self.state.lock();
        state.items.push_back(frame);
        self.cv.notify_all();
        Ok(())
    }

    fn on_sink_event(&self, elem: &Element, _pad: &Pad, event: &Event) -> Result<()> {
        match event {
            Event::FlushRequested { .. } | Event::SeekRequested { .. } => {
                self.flush();
                elem.push_event_to_downstream(event.clone())
            }
            _ => Err(Error::NoImpl),
        }
    }

    fn on_loop(&self, elem: &Element) -> Result<()> {
        let Some(frame) = self.pop_or_wait() else {
            return Ok(());
        };

        let master_pos = self
            .controller(elem)
            .and_then(|c| c.master_clock())
            .map(|c| c.position());

        if let Some(master) = master_pos {
            let diff = master - frame.timestamp_secs;

            if diff < -MIN_WAIT_SECS && diff > -MAX_WAIT_AHEAD_SECS {
                let flushed = self.wait_for_pts(elem, Duration::from_secs_f64(-diff));
                if flushed || elem.stop_requested() {
                    return Ok(());
                }
            } else if diff > DROP_THRESHOLD_SECS {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped as u64 % DROP_WARN_THRESHOLD == 0 {
                    log::warn!("[{}] dropped {dropped} video frames (behind master clock)", elem.name());
                }
                return Ok(());
            }
        }

        self.renderer.render(&frame);
        Ok(())
    }
}

fn construct(name: &str) -> Arc<Element> {
    VideoSink::new(name, FakeVideoRenderer::new()).0
}

inventory::submit! {
    ElementFactoryEntry {
        type_name: "streamforge.videosink",
        constructor: construct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::format::PixelFormat;
    use streamforge_core::state::State;
    use streamforge_runtime::clock::{ClockType, MediaClock};
    use streamforge_runtime::context::Context;

    fn frame(pts: f64) -> MediaFrame {
        MediaFrame::video(PixelFormat::RGBA, 2, 2, vec![vec![0u8; 16]]).with_timing(pts, 0.04)
    }

    struct FixedClock(f64);
    impl MediaClock for FixedClock {
        fn position(&self) -> f64 {
            self.0
        }
        fn clock_type(&self) -> ClockType {
            ClockType::External
        }
    }

    fn wire(position: f64) -> (Arc<Element>, Arc<VideoSink>, Arc<FakeVideoRenderer>) {
        let renderer = FakeVideoRenderer::new();
        let (elem, sink) = VideoSink::new("v", renderer.clone());
        let controller = MediaController::new();
        controller.add_clock(Arc::new(FixedClock(position)));
        let context = Context::new();
        context.add_object(controller, None);
        elem.set_context(Some(context)).unwrap();
        elem.set_state(State::Running).unwrap();
        (elem, sink, renderer)
    }

    #[test]
    fn frame_in_sync_is_rendered() {
        let (elem, sink, renderer) = wire(1.0);
        sink.on_sink_push(&elem, &elem.find_input("sink").unwrap(), frame(1.0).into())
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(renderer.rendered_count(), 1);
        elem.set_state(State::Null).unwrap();
    }

    #[test]
    fn stale_frame_is_dropped_not_rendered() {
        let (elem, sink, renderer) = wire(5.0);
        sink.on_sink_push(&elem, &elem.find_input("sink").unwrap(), frame(0.0).into())
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(renderer.rendered_count(), 0);
        assert_eq!(sink.dropped_count(), 1);
        elem.set_state(State::Null).unwrap();
    }

    #[test]
    fn flush_drops_queued_frame_before_it_renders() {
        let (elem, sink, renderer) = wire(0.0);
        // Frame is 2s ahead of master: the sink will wait, then be
        // interrupted by the flush below instead of rendering late.
        sink.on_sink_push(&elem, &elem.find_input("sink").unwrap(), frame(2.0).into())
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        sink.on_sink_event(
            &elem,
            &elem.find_input("sink").unwrap(),
            &Event::FlushRequested {
                sender: "v".into(),
                ticks: 0,
            },
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(renderer.rendered_count(), 0);
        elem.set_state(State::Null).unwrap();
    }
}
