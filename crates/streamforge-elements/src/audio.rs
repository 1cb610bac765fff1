//! Reference audio sink: both a sink element and the `MediaClock` whose
//! position tracks whatever sample is currently playing.
//!
//! The real OS audio backend is an external collaborator (§1); this module
//! defines only the `AudioDevice` trait it is expected to implement, plus
//! an in-memory `FakeAudioDevice` that pulls samples on its own thread the
//! same way a real device would, for tests and the headless demo binary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::resource::{MediaFrame, Resource};
use streamforge_runtime::clock::{ClockType, MediaClock, MediaController};
use streamforge_runtime::element::{Element, ElementDelegate};
use streamforge_runtime::factory::ElementFactoryEntry;
use streamforge_runtime::pad::Pad;
use streamforge_runtime::thread;

/// Soft cap on queued frames before `push` starts blocking the producer.
pub const DEFAULT_SOFT_CAP: usize = 16;

/// Called by the device on its own thread whenever it needs more samples.
/// The sink fills `buf` completely; if it runs out of queued audio it pads
/// the remainder with silence.
pub type PullCallback = Arc<dyn Fn(&mut [u8]) + Send + Sync>;

/// The external OS audio device abstraction. A real backend opens a
/// hardware or platform-mixer stream and calls `pull` from its own
/// real-time thread; `close` tears that down.
pub trait AudioDevice: Send + Sync {
    fn open(&self, pull: PullCallback) -> Result<()>;
    fn close(&self);
}

/// An in-memory stand-in that calls `pull` on a fixed interval from a
/// background thread, exactly as a real device would, without touching any
/// OS audio API. Used by this crate's tests and the demonstration binary.
pub struct FakeAudioDevice {
    bytes_per_pull: usize,
    interval: Duration,
    running: Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl FakeAudioDevice {
    pub fn new(bytes_per_pull: usize, interval: Duration) -> Arc<FakeAudioDevice> {
        Arc::new(FakeAudioDevice {
            bytes_per_pull,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            join: Mutex::new(None),
        })
    }
}

impl AudioDevice for FakeAudioDevice {
    fn open(&self, pull: PullCallback) -> Result<()> {
        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let bytes_per_pull = self.bytes_per_pull;
        let interval = self.interval;
        let join = std::thread::Builder::new()
            .name("streamforge-fake-audio-device".into())
            .spawn(move || {
                let mut buf = vec![0u8; bytes_per_pull];
                while running.load(Ordering::Acquire) {
                    pull(&mut buf);
                    std::thread::sleep(interval);
                }
            })
            .map_err(|e| Error::External(anyhow::anyhow!(e)))?;
        *self.join.lock() = Some(join);
        Ok(())
    }

    fn close(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.lock().take() {
            let _ = join.join();
        }
    }
}

struct PlayingFrame {
    frame: MediaFrame,
    cursor: usize,
}

pub struct AudioSink {
    self_weak: Weak<AudioSink>,
    device: Arc<dyn AudioDevice>,
    queue: Mutex<VecDeque<MediaFrame>>,
    current: Mutex<Option<PlayingFrame>>,
    position: Mutex<f64>,
    soft_cap: usize,
}

impl AudioSink {
    /// `self_weak` lets `on_initialize` hand the controller an
    /// `Arc<dyn MediaClock>` pointing back at this sink without the
    /// delegate needing to already own an `Arc<Self>` (it only ever sees
    /// `&self`) — built with `Arc::new_cyclic` so the weak reference is
    /// valid from the very first call.
    pub fn new(name: impl Into<String>, device: Arc<dyn AudioDevice>) -> (Arc<Element>, Arc<AudioSink>) {
        Self::with_soft_cap(name, device, DEFAULT_SOFT_CAP)
    }

    pub fn with_soft_cap(
        name: impl Into<String>,
        device: Arc<dyn AudioDevice>,
        soft_cap: usize,
    ) -> (Arc<Element>, Arc<AudioSink>) {
        let sink = Arc::new_cyclic(|weak| AudioSink {
            self_weak: weak.clone(),
            device,
            queue: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            position: Mutex::new(0.0),
            soft_cap,
        });
        let elem = Element::new_non_threaded(name, sink.clone());
        elem.add_input("sink");
        (elem, sink)
    }

    fn pull(&self, buf: &mut [u8]) {
        let mut offset = 0;
        while offset < buf.len() {
            let mut current = self.current.lock();
            if current.is_none() {
                let popped = self.queue.lock().pop_front();
                match popped {
                    Some(frame) => {
                        *self.position.lock() = frame.timestamp_secs;
                        *current = Some(PlayingFrame { frame, cursor: 0 });
                    }
                    None => {
                        buf[offset..].fill(0);
                        return;
                    }
                }
            }

            let playing = current.as_mut().expect("just populated above");
            let bytes = playing.frame.plane(0).unwrap_or(&[]);
            let remaining_frame = bytes.len().saturating_sub(playing.cursor);
            let remaining_out = buf.len() - offset;
            let n = remaining_frame.min(remaining_out);

            if n == 0 {
                *current = None;
                continue;
            }

            buf[offset..offset + n].copy_from_slice(&bytes[playing.cursor..playing.cursor + n]);
            playing.cursor += n;
            offset += n;

            if playing.frame.duration_secs > 0.0 && !bytes.is_empty() {
                let advance = playing.frame.duration_secs * (n as f64) / (bytes.len() as f64);
                *self.position.lock() += advance;
            }

            if playing.cursor >= bytes.len() {
                *current = None;
            }
        }
    }

    fn controller(&self, elem: &Element) -> Option<Arc<MediaController>> {
        elem.context()?.query_object::<MediaController>()
    }

    fn as_clock(&self) -> Option<Arc<dyn MediaClock>> {
        self.self_weak.upgrade().map(|s| s as Arc<dyn MediaClock>)
    }
}

impl MediaClock for AudioSink {
    fn position(&self) -> f64 {
        *self.position.lock()
    }

    fn clock_type(&self) -> ClockType {
        ClockType::Audio
    }
}

impl ElementDelegate for AudioSink {
    fn on_initialize(&self, elem: &Element) -> Result<()> {
        let weak = self.self_weak.clone();
        let pull_cb: PullCallback = Arc::new(move |buf| match weak.upgrade() {
            Some(sink) => sink.pull(buf),
            None => buf.fill(0),
        });
        self.device.open(pull_cb)?;
        if let (Some(controller), Some(clock)) = (self.controller(elem), self.as_clock()) {
            controller.add_clock(clock);
        }
        Ok(())
    }

    fn on_teardown(&self, elem: &Element) -> Result<()> {
        self.device.close();
        if let (Some(controller), Some(clock)) = (self.controller(elem), self.as_clock()) {
            controller.remove_clock(&clock);
        }
        self.queue.lock().clear();
        *self.current.lock() = None;
        Ok(())
    }

    fn on_sink_push(&self, elem: &Element, _pad: &Pad, resource: Resource) -> Result<()> {
        let frame = match resource {
            Resource::Frame(f) => f,
            Resource::Packet(_) => return Err(Error::UnsupportedResource),
        };
        loop {
            {
                let mut q = self.queue.lock();
                if q.len() < self.soft_cap {
                    q.push_back(frame);
                    break;
                }
            }
            if elem.stop_requested() {
                return Ok(());
            }
            match thread::msleep(Duration::from_millis(10)) {
                Ok(()) | Err(Error::Interrupted) => {}
                Err(e) => return Err(e),
            }
            if elem.stop_requested() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn on_sink_event(&self, elem: &Element, _pad: &Pad, event: &Event) -> Result<()> {
        match event {
            Event::FlushRequested { .. } | Event::SeekRequested { .. } => {
                self.queue.lock().clear();
                *self.current.lock() = None;
                elem.push_event_to_downstream(event.clone())
            }
            _ => Err(Error::NoImpl),
        }
    }
}

fn construct(name: &str) -> Arc<Element> {
    let device = FakeAudioDevice::new(4096, Duration::from_millis(50));
    AudioSink::new(name, device).0
}

inventory::submit! {
    ElementFactoryEntry {
        type_name: "streamforge.audiosink",
        constructor: construct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::format::SampleFormat;
    use streamforge_core::state::State;

    fn audio_frame(pts: f64, dur: f64, bytes: Vec<u8>) -> MediaFrame {
        MediaFrame::audio(SampleFormat::S16, 48_000, 2, (bytes.len() / 4) as u32, vec![bytes])
            .with_timing(pts, dur)
    }

    #[test]
    fn pull_emits_silence_when_queue_empty() {
        let (elem, sink) = AudioSink::new("a", FakeAudioDevice::new(8, Duration::from_secs(1)));
        elem.set_state(State::Ready).unwrap();
        let mut buf = vec![0xFFu8; 8];
        sink.pull(&mut buf);
        assert_eq!(buf, vec![0u8; 8]);
        elem.set_state(State::Null).unwrap();
    }

    #[test]
    fn pull_advances_clock_position_with_frame_bytes() {
        let (elem, sink) = AudioSink::new("a", FakeAudioDevice::new(8, Duration::from_secs(1)));
        elem.set_state(State::Ready).unwrap();
        sink.queue.lock().push_back(audio_frame(1.0, 0.1, vec![1, 2, 3, 4, 5, 6, 7, 8]));

        let mut buf = vec![0u8; 4];
        sink.pull(&mut buf);
        assert_eq!(buf, vec![1, 2, 3, 4]);
        assert!((sink.position() - 1.05).abs() < 1e-6, "position was {}", sink.position());

        sink.pull(&mut buf);
        assert_eq!(buf, vec![5, 6, 7, 8]);
        assert!((sink.position() - 1.1).abs() < 1e-6);

        elem.set_state(State::Null).unwrap();
    }

    #[test]
    fn registers_as_master_clock_while_running() {
        let controller = MediaController::new();
        let context = streamforge_runtime::context::Context::new();
        context.add_object(controller.clone(), None);

        let (elem, _sink) = AudioSink::new("a", FakeAudioDevice::new(8, Duration::from_secs(1)));
        elem.set_context(Some(context)).unwrap();
        elem.set_state(State::Ready).unwrap();

        let master = controller.master_clock().expect("audio sink registered");
        assert_eq!(master.clock_type(), ClockType::Audio);

        elem.set_state(State::Null).unwrap();
        assert!(controller.master_clock().is_none());
    }

    #[test]
    fn flush_drops_queued_and_in_flight_frame() {
        let (elem, sink) = AudioSink::new("a", FakeAudioDevice::new(8, Duration::from_secs(1)));
        elem.set_state(State::Ready).unwrap();
        sink.queue.lock().push_back(audio_frame(0.0, 0.1, vec![1; 8]));

        let input = elem.find_input("sink").unwrap();
        input
            .push_event(Event::FlushRequested {
                sender: "a".into(),
                ticks: 0,
            })
            .or_else(|e| if e == Error::NoLink { Ok(()) } else { Err(e) })
            .unwrap_or(());

        // Event callbacks are only reachable through a linked peer pad; drive
        // the delegate hook directly to exercise the flush path in isolation.
        sink.on_sink_event(
            &elem,
            &input,
            &Event::FlushRequested {
                sender: "a".into(),
                ticks: 0,
            },
        )
        .unwrap();
        assert_eq!(sink.queue.lock().len(), 0);
        elem.set_state(State::Null).unwrap();
    }
}
