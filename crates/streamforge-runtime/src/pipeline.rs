//! Top-level container: owns the event bus, a shared context, and the
//! dispatch thread that drains the bus and invokes the user's event
//! callback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::state::State;

use crate::bus::EventBus;
use crate::clock::MediaController;
use crate::container::{dump_topology, Container};
use crate::context::Context;
use crate::element::Element;
use crate::thread::{self, Thread};
use crate::time::ticks;

pub type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

/// How often the master clock is sampled for `ClockUpdated` reporting.
const CLOCK_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Minimum jump in the master clock's position before a `ClockUpdated` is
/// posted; keeps a continuously-advancing clock from flooding the bus.
const CLOCK_REPORT_THRESHOLD_SECS: f64 = 1.0;

pub struct Pipeline {
    container: Container,
    bus: Arc<EventBus>,
    context: Arc<Context>,
    controller: Arc<MediaController>,
    dispatch: Thread,
    clock_sampler: Thread,
    last_reported_position: Mutex<f64>,
    callback: Mutex<Option<EventCallback>>,
}

impl Pipeline {
    pub fn new() -> Arc<Pipeline> {
        let pipeline = Arc::new(Pipeline {
            container: Container::new(),
            bus: EventBus::new(),
            context: Context::new(),
            controller: MediaController::new(),
            dispatch: Thread::new(),
            clock_sampler: Thread::new(),
            last_reported_position: Mutex::new(0.0),
            callback: Mutex::new(None),
        });
        pipeline.dispatch.set_name("streamforge-pipeline-dispatch");
        pipeline.clock_sampler.set_name("streamforge-pipeline-clock");
        // Registered so elements can look up the clock controller through
        // their own `context()` (e.g. an audio sink registering itself as
        // the master clock from `on_initialize`).
        pipeline.context.add_object(pipeline.controller.clone(), None);
        pipeline.start_dispatch_loop();
        pipeline.start_clock_sample_loop();
        pipeline
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn context(&self) -> Arc<Context> {
        self.context.clone()
    }

    pub fn controller(&self) -> Arc<MediaController> {
        self.controller.clone()
    }

    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        *self.callback.lock() = Some(Box::new(callback));
    }

    pub fn add_element(&self, element: Arc<Element>) -> Result<()> {
        self.container
            .add_element(element, Some(self.bus.clone()), Some(self.context.clone()))
    }

    pub fn detach_element(&self, element: &Arc<Element>) -> Result<()> {
        self.container.detach_element(element)
    }

    pub fn for_elements(&self, cb: impl FnMut(&Arc<Element>) -> bool) {
        self.container.for_elements(cb)
    }

    pub fn elements(&self) -> Vec<Arc<Element>> {
        self.container.elements()
    }

    pub fn dump_topology(&self) -> String {
        dump_topology(&self.container.elements())
    }

    pub fn has_cycle(&self) -> bool {
        crate::container::has_cycle(&self.container.elements())
    }

    /// Post an event onto the bus asynchronously (the poster does not wait
    /// for the dispatch thread to process it).
    pub fn post_event(&self, event: Event) {
        self.bus.post_message(event);
    }

    /// Post an event and block until the dispatch thread has processed it.
    pub fn send_event(self: &Arc<Self>, event: Event) {
        let pipeline = self.clone();
        self.dispatch.send_task(move || pipeline.process_event(event));
    }

    pub fn change_state(&self, target: State) -> Result<()> {
        self.container.set_state(target)
    }

    fn process_event(&self, event: Event) {
        if let Event::ErrorOccurred { sender, message, .. } = &event {
            log::error!("pipeline: error from {sender}: {message}");
        }
        if let Some(callback) = self.callback.lock().as_ref() {
            callback(&event);
        }
    }

    fn start_dispatch_loop(self: &Arc<Self>) {
        let pipeline = Arc::downgrade(self);
        self.dispatch.post_task(move || dispatch_loop(pipeline));
    }

    fn start_clock_sample_loop(self: &Arc<Self>) {
        let pipeline = Arc::downgrade(self);
        self.clock_sampler.post_task(move || clock_sample_loop(pipeline));
    }

    /// Reads the current master clock (if any) and posts `ClockUpdated` onto
    /// the bus once its position has moved more than the reporting threshold
    /// since the last report.
    fn sample_master_clock(&self) {
        let Some(master) = self.controller.master_clock() else {
            return;
        };
        let position = master.position();
        let mut last = self.last_reported_position.lock();
        if (position - *last).abs() > CLOCK_REPORT_THRESHOLD_SECS {
            *last = position;
            drop(last);
            self.bus.post_message(Event::ClockUpdated {
                sender: "pipeline".to_owned(),
                position_secs: position,
                ticks: ticks(),
            });
        }
    }
}

/// Holds only a `Weak` handle to the pipeline so the dispatch thread's own
/// queued task never keeps the pipeline alive: the last external `Arc` being
/// dropped must be enough for `Pipeline`'s `Drop` (and in turn `Thread`'s
/// shutdown-and-join) to run.
fn dispatch_loop(pipeline: std::sync::Weak<Pipeline>) {
    let Some(pipeline) = pipeline.upgrade() else {
        return;
    };
    while let Some(event) = pipeline.bus.wait_message(Some(std::time::Duration::from_millis(200))) {
        if matches!(event, Event::PipelineWakeup) && pipeline.dispatch_should_stop() {
            return;
        }
        pipeline.process_event(event);
    }
    if !pipeline.dispatch_should_stop() {
        let weak = Arc::downgrade(&pipeline);
        pipeline.dispatch.post_task(move || dispatch_loop(weak));
    }
}

fn clock_sample_loop(pipeline: std::sync::Weak<Pipeline>) {
    let Some(pipeline) = pipeline.upgrade() else {
        return;
    };
    if pipeline.dispatch_should_stop() {
        return;
    }
    pipeline.sample_master_clock();
    let _ = thread::msleep(CLOCK_SAMPLE_INTERVAL);
    if !pipeline.dispatch_should_stop() {
        let weak = Arc::downgrade(&pipeline);
        pipeline.clock_sampler.post_task(move || clock_sample_loop(weak));
    }
}

impl Pipeline {
    fn dispatch_should_stop(&self) -> bool {
        Arc::strong_count(&self.context) == 1 && self.container.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementDelegate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Noop;
    impl ElementDelegate for Noop {}

    #[test]
    fn error_event_reaches_user_callback() {
        let pipeline = Pipeline::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        pipeline.set_event_callback(move |event| {
            if matches!(event, Event::ErrorOccurred { .. }) {
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        });

        let elem = Element::new_non_threaded("e", Arc::new(Noop));
        pipeline.add_element(elem.clone()).unwrap();
        elem.raise_error(Error::Internal("boom".into()), "boom");

        // Give the dispatch thread a moment to process the posted event.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bus_ordering_preserved_through_send_event() {
        let pipeline = Pipeline::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order2 = order.clone();
        pipeline.set_event_callback(move |event| {
            if let Event::User { name, .. } = event {
                order2.lock().push(name.clone());
            }
        });
        pipeline.send_event(Event::User {
            sender: "t".into(),
            name: "one".into(),
            payload: String::new(),
            ticks: 0,
        });
        pipeline.send_event(Event::User {
            sender: "t".into(),
            name: "two".into(),
            payload: String::new(),
            ticks: 0,
        });
        assert_eq!(*order.lock(), vec!["one".to_string(), "two".to_string()]);
    }

    struct FixedClock(Mutex<f64>);
    impl crate::clock::MediaClock for FixedClock {
        fn position(&self) -> f64 {
            *self.0.lock()
        }
        fn clock_type(&self) -> streamforge_core::clock::ClockType {
            streamforge_core::clock::ClockType::Audio
        }
    }

    #[test]
    fn clock_updated_is_posted_once_position_passes_threshold() {
        let pipeline = Pipeline::new();
        let clock = Arc::new(FixedClock(Mutex::new(0.0)));
        pipeline.controller().add_clock(clock.clone() as Arc<dyn crate::clock::MediaClock>);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        pipeline.set_event_callback(move |event| {
            if let Event::ClockUpdated { position_secs, .. } = event {
                seen2.lock().push(*position_secs);
            }
        });

        *clock.0.lock() = 5.0;
        std::thread::sleep(std::time::Duration::from_millis(500));

        let reported = seen.lock().clone();
        assert!(!reported.is_empty(), "expected at least one ClockUpdated event");
        assert!((reported[0] - 5.0).abs() < 1e-6);
    }
}
