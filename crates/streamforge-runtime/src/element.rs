//! State-machined processing unit owning pads.
//!
//! The original splits this into a virtual `Element` interface plus an
//! `ElementBase` mixin that concrete elements compose via CRTP. Rust has no
//! equivalent of that template trick, so the two collapse into one concrete
//! `Element` struct that owns the common machinery (pads, state, bus,
//! context, optional private thread) and holds a `dyn ElementDelegate` for
//! the behavior concrete elements plug in — composition instead of mixin
//! inheritance, same division of responsibility.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::resource::Resource;
use streamforge_core::state::{compute_state_changes, State, StateChange};

use crate::bus::EventBus;
use crate::context::Context;
use crate::pad::{Pad, PadKind};
use crate::thread::{Thread, ThreadRef};
use crate::time::ticks;

/// Hooks a concrete element plugs into the shared `Element` machinery.
/// Every method has a default so an implementor only overrides what it
/// actually needs — mirroring the original's `ElementDelegate` base with
/// no-op/`NoImpl` defaults.
pub trait ElementDelegate: Send + Sync {
    fn on_initialize(&self, _elem: &Element) -> Result<()> {
        Ok(())
    }
    fn on_prepare(&self, _elem: &Element) -> Result<()> {
        Ok(())
    }
    fn on_run(&self, _elem: &Element) -> Result<()> {
        Ok(())
    }
    fn on_pause(&self, _elem: &Element) -> Result<()> {
        Ok(())
    }
    fn on_stop(&self, _elem: &Element) -> Result<()> {
        Ok(())
    }
    fn on_teardown(&self, _elem: &Element) -> Result<()> {
        Ok(())
    }

    /// Called when an event reaches this element via `send_event`. Default:
    /// not handled, so the event is forwarded downstream (see `Element::send_event`).
    fn on_event(&self, _elem: &Element, _event: &Event) -> Result<()> {
        Err(Error::NoImpl)
    }

    /// Called when an event arrives on one of this element's input pads.
    /// `NoImpl` (the default) means "forward downstream on all output pads."
    fn on_sink_event(&self, _elem: &Element, _pad: &Pad, _event: &Event) -> Result<()> {
        Err(Error::NoImpl)
    }

    /// Called when a resource arrives on one of this element's input pads.
    fn on_sink_push(&self, _elem: &Element, _pad: &Pad, _resource: Resource) -> Result<()> {
        Err(Error::NoImpl)
    }

    /// The body of a threaded element's private run loop. Called
    /// repeatedly while the element is Running; the default just waits for
    /// the next queued task.
    fn on_loop(&self, elem: &Element) -> Result<()> {
        if let Some(thread) = elem.thread() {
            thread.wait_task(Some(std::time::Duration::from_millis(200)));
        }
        Ok(())
    }
}

struct SharedCtx {
    bus: Option<Arc<EventBus>>,
    context: Option<Arc<Context>>,
}

/// A state-machined node in the pipeline graph.
pub struct Element {
    name: String,
    state: Mutex<State>,
    shared: Mutex<SharedCtx>,
    inputs: Mutex<Vec<Pad>>,
    outputs: Mutex<Vec<Pad>>,
    thread: Option<Thread>,
    delegate: Arc<dyn ElementDelegate>,
    error_count: AtomicUsize,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name)
            .field("state", &*self.state.lock())
            .field("threaded", &self.thread.is_some())
            .finish()
    }
}

impl Element {
    pub fn new_non_threaded(name: impl Into<String>, delegate: Arc<dyn ElementDelegate>) -> Arc<Element> {
        Arc::new(Element {
            name: name.into(),
            state: Mutex::new(State::Null),
            shared: Mutex::new(SharedCtx { bus: None, context: None }),
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
            thread: None,
            delegate,
            error_count: AtomicUsize::new(0),
        })
    }

    /// A threaded element's private worker is created eagerly here (not
    /// lazily at `onInitialize`) since in Rust the handle must live inside
    /// the `Element` from construction; the delegate's `on_initialize` is
    /// still where codec/device resources get opened.
    pub fn new_threaded(name: impl Into<String>, delegate: Arc<dyn ElementDelegate>) -> Arc<Element> {
        Arc::new(Element {
            name: name.into(),
            state: Mutex::new(State::Null),
            shared: Mutex::new(SharedCtx { bus: None, context: None }),
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
            thread: Some(Thread::new()),
            delegate,
            error_count: AtomicUsize::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        *self.state.lock()
    }

    pub fn is_threaded(&self) -> bool {
        self.thread.is_some()
    }

    pub fn thread(&self) -> Option<ThreadRef> {
        self.thread.as_ref().map(|t| t.handle())
    }

    /// True once this element's state has returned to `Null` while its
    /// worker loop is asking whether to keep running.
    pub fn stop_requested(&self) -> bool {
        self.state() == State::Null
    }

    pub fn bus(&self) -> Option<Arc<EventBus>> {
        self.shared.lock().bus.clone()
    }

    pub fn context(&self) -> Option<Arc<Context>> {
        self.shared.lock().context.clone()
    }

    /// Installed by the enclosing container; only legal while `Null`.
    pub fn set_bus(&self, bus: Option<Arc<EventBus>>) -> Result<()> {
        if self.state() != State::Null {
            return Err(Error::InvalidState);
        }
        self.shared.lock().bus = bus;
        Ok(())
    }

    pub fn set_context(&self, context: Option<Arc<Context>>) -> Result<()> {
        if self.state() != State::Null {
            return Err(Error::InvalidState);
        }
        self.shared.lock().context = context;
        Ok(())
    }

    fn wire_input(self: &Arc<Self>, pad: &Pad) {
        let elem = self.clone();
        let pad_for_push = pad.clone();
        pad.set_callback(move |resource| {
            let elem = elem.clone();
            let pad = pad_for_push.clone();
            if let Some(thread) = elem.thread() {
                thread.send_task(move || {
                    if let Err(e) = elem.delegate.on_sink_push(&elem, &pad, resource) {
                        if e != Error::NoImpl {
                            elem.raise_error(e, "");
                        }
                    }
                });
                Ok(())
            } else {
                elem.delegate.on_sink_push(&elem, &pad, resource)
            }
        });

        let elem = self.clone();
        let pad_for_event = pad.clone();
        pad.set_event_callback(move |event| {
            let result = elem.delegate.on_sink_event(&elem, &pad_for_event, &event);
            match result {
                Err(Error::NoImpl) => elem.push_event_to_downstream(event),
                other => other,
            }
        });
    }

    pub fn add_input(self: &Arc<Self>, name: impl Into<String>) -> Pad {
        let pad = Pad::new(self.name.clone(), PadKind::Input, name);
        self.wire_input(&pad);
        self.inputs.lock().push(pad.clone());
        pad
    }

    pub fn add_output(self: &Arc<Self>, name: impl Into<String>) -> Pad {
        let pad = Pad::new(self.name.clone(), PadKind::Output, name);
        self.outputs.lock().push(pad.clone());
        pad
    }

    pub fn find_input(&self, name: &str) -> Option<Pad> {
        self.inputs.lock().iter().find(|p| p.name() == name).cloned()
    }

    pub fn find_output(&self, name: &str) -> Option<Pad> {
        self.outputs.lock().iter().find(|p| p.name() == name).cloned()
    }

    pub fn inputs(&self) -> Vec<Pad> {
        self.inputs.lock().clone()
    }

    pub fn outputs(&self) -> Vec<Pad> {
        self.outputs.lock().clone()
    }

    pub fn remove_pad(&self, pad: &Pad) {
        pad.unlink();
        self.inputs.lock().retain(|p| p.name() != pad.name() || p.kind() != pad.kind());
        self.outputs.lock().retain(|p| p.name() != pad.name() || p.kind() != pad.kind());
    }

    /// Push `resource` directly onto a specific output pad owned by this
    /// element (helper for delegate implementations).
    pub fn push_to(&self, pad: &Pad, resource: Resource) -> Result<()> {
        pad.push(resource)
    }

    pub fn push_event_to(&self, pad: &Pad, event: Event) -> Result<()> {
        pad.push_event(event)
    }

    /// Broadcast `event` to every output pad (downstream).
    pub fn push_event_to_downstream(&self, event: Event) -> Result<()> {
        let mut last = Ok(());
        for pad in self.outputs.lock().iter() {
            if let Err(e) = pad.push_event(event.clone()) {
                if e != Error::NoLink {
                    last = Err(e);
                }
            }
        }
        last
    }

    /// Broadcast `event` to every input pad (upstream) — used e.g. by a
    /// sink propagating a buffering event back toward its source.
    pub fn push_event_to_upstream(&self, event: Event) -> Result<()> {
        let mut last = Ok(());
        for pad in self.inputs.lock().iter() {
            if let Err(e) = pad.push_event(event.clone()) {
                if e != Error::NoLink {
                    last = Err(e);
                }
            }
        }
        last
    }

    /// Build and post an `ErrorEvent` to the bus, tagged with this element
    /// as sender. Errors raised here never propagate back to the caller —
    /// use the pipeline's event callback to observe them.
    pub fn raise_error(&self, error: Error, message: impl Into<String>) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        let msg = message.into();
        let message = if msg.is_empty() { error.to_string() } else { msg };
        log::error!("[{}] {message}", self.name);
        if let Some(bus) = self.bus() {
            bus.post_message(Event::ErrorOccurred {
                sender: self.name.clone(),
                error,
                message,
                ticks: ticks(),
            });
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Deliver `event` to this element. Default behavior (when the delegate
    /// returns `NoImpl`) forwards it downstream.
    pub fn send_event(&self, event: Event) -> Result<()> {
        match self.delegate.on_event(self, &event) {
            Err(Error::NoImpl) => self.push_event_to_downstream(event),
            other => other,
        }
    }

    fn dispatch_one(&self, change: StateChange) -> Result<()> {
        log::debug!("[{}] state change {change:?}", self.name);
        let result = match change {
            StateChange::NullToReady => self.delegate.on_initialize(self),
            StateChange::ReadyToPaused => self.delegate.on_prepare(self),
            StateChange::PausedToRunning => self.delegate.on_run(self),
            StateChange::RunningToPaused => self.delegate.on_pause(self),
            StateChange::PausedToReady => self.delegate.on_stop(self),
            StateChange::ReadyToNull => self.delegate.on_teardown(self),
        };
        result
    }

    /// Compute the adjacent-transition path from the current state to
    /// `target` and apply each handler in order. Stops at the first
    /// failure; the element's observable state is the last one
    /// successfully entered.
    pub fn set_state(self: &Arc<Self>, target: State) -> Result<()> {
        let path = compute_state_changes(self.state(), target);
        for change in path {
            let result = if let Some(thread) = self.thread() {
                let elem = self.clone();
                thread.invoke_queued(move || elem.dispatch_one(change))
            } else {
                self.dispatch_one(change)
            };
            if let Err(e) = result {
                return Err(e);
            }
            *self.state.lock() = change.target();

            if change == StateChange::NullToReady && self.is_threaded() {
                self.start_loop();
            }

            if let Some(bus) = self.bus() {
                bus.post_message(Event::StateChanged {
                    sender: self.name.clone(),
                    ticks: ticks(),
                });
            }
        }
        Ok(())
    }

    /// Post the run-loop as a recurring task on the private thread. Runs
    /// until the element's state returns to `Null`.
    fn start_loop(self: &Arc<Self>) {
        let Some(thread) = self.thread() else { return };
        let elem = self.clone();
        thread.post_task(move || loop_body(elem));
    }
}

fn loop_body(elem: Arc<Element>) {
    if elem.stop_requested() {
        return;
    }
    if let Err(e) = elem.delegate.on_loop(&elem) {
        if e != Error::NoImpl && e != Error::Interrupted {
            elem.raise_error(e, "");
        }
    }
    if let Some(thread) = elem.thread() {
        if !elem.stop_requested() {
            thread.post_task(move || loop_body(elem));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct Passthrough;
    impl ElementDelegate for Passthrough {}

    #[test]
    fn non_threaded_state_path() {
        let elem = Element::new_non_threaded("e", Arc::new(Passthrough));
        elem.set_state(State::Running).unwrap();
        assert_eq!(elem.state(), State::Running);
        elem.set_state(State::Null).unwrap();
        assert_eq!(elem.state(), State::Null);
    }

    struct FailOnPrepare;
    impl ElementDelegate for FailOnPrepare {
        fn on_prepare(&self, _elem: &Element) -> Result<()> {
            Err(Error::InvalidArguments)
        }
    }

    #[test]
    fn failed_transition_stops_mid_path() {
        let elem = Element::new_non_threaded("e", Arc::new(FailOnPrepare));
        let err = elem.set_state(State::Running).unwrap_err();
        assert_eq!(err, Error::InvalidArguments);
        assert_eq!(elem.state(), State::Ready);
    }

    struct CountingThreaded {
        initialized: Arc<AtomicBool>,
    }
    impl ElementDelegate for CountingThreaded {
        fn on_initialize(&self, _elem: &Element) -> Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn threaded_handlers_run_on_private_thread() {
        let initialized = Arc::new(AtomicBool::new(false));
        let elem = Element::new_threaded(
            "t",
            Arc::new(CountingThreaded {
                initialized: initialized.clone(),
            }),
        );
        elem.set_state(State::Ready).unwrap();
        assert!(initialized.load(Ordering::SeqCst));
        elem.set_state(State::Null).unwrap();
    }
}
