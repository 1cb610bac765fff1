//! Bounded FIFO between a producer and a consumer stage.
//!
//! Capacity is counted in items (packets or frames), not bytes — the
//! original's queue is sized the same way. `duration()` is a running sum
//! maintained under the same lock as the FIFO itself, so it never drifts
//! from the sum of what's actually queued.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::resource::Resource;
use streamforge_runtime::element::{Element, ElementDelegate};
use streamforge_runtime::factory::ElementFactoryEntry;
use streamforge_runtime::pad::Pad;
use streamforge_runtime::thread;

/// Default item capacity, matching the original's "a few hundred" sizing.
pub const DEFAULT_CAPACITY: usize = 200;

struct QueueState {
    items: VecDeque<Resource>,
    duration_secs: f64,
}

pub struct Queue {
    capacity: usize,
    state: Mutex<QueueState>,
}

impl Queue {
    /// Returns both the element handle (for wiring into a pipeline) and the
    /// concrete `Queue` handle (for querying `size`/`duration` directly) —
    /// the caller already holds the concrete type before erasing it into
    /// `Arc<dyn ElementDelegate>`, so no downcast is needed later.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Arc<Element>, Arc<Queue>) {
        let queue = Arc::new(Queue {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                duration_secs: 0.0,
            }),
        });
        let elem = Element::new_non_threaded(name, queue.clone());
        elem.add_input("sink");
        elem.add_output("src");
        (elem, queue)
    }

    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn duration(&self) -> f64 {
        self.state.lock().duration_secs
    }

    fn pop_front(&self) -> Option<Resource> {
        let mut state = self.state.lock();
        let item = state.items.pop_front()?;
        state.duration_secs = (state.duration_secs - item.duration_secs()).max(0.0);
        Some(item)
    }

    fn flush(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.duration_secs = 0.0;
    }

    /// A non-threaded queue has no private worker loop to drain itself, so
    /// every push immediately forwards whatever it can to the output pad —
    /// this keeps the queue acting purely as a bounded buffer rather than a
    /// store that never empties on its own.
    fn drain_to_output(&self, elem: &Element) -> Result<()> {
        let Some(out) = elem.find_output("src") else {
            return Ok(());
        };
        if !out.is_linked() {
            return Ok(());
        }
        while let Some(item) = self.pop_front() {
            if let Err(e) = out.push(item) {
                if e != Error::NoLink {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl ElementDelegate for Queue {
    fn on_sink_push(&self, elem: &Element, _pad: &Pad, resource: Resource) -> Result<()> {
        loop {
            {
                let mut state = self.state.lock();
                if state.items.len() < self.capacity {
                    state.duration_secs += resource.duration_secs();
                    state.items.push_back(resource);
                    break;
                }
            }
            if elem.stop_requested() {
                return Ok(());
            }
            // Full: wait, interruptibly, for room to free up. A state change
            // posts a task to the calling thread (if it is a bound worker)
            // and wakes this early; otherwise the fixed poll period still
            // notices `stop_requested()` promptly.
            match thread::msleep(Duration::from_millis(10)) {
                Ok(()) => {}
                Err(Error::Interrupted) => {}
                Err(e) => return Err(e),
            }
            if elem.stop_requested() {
                return Ok(());
            }
        }
        self.drain_to_output(elem)
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
}

fn construct(name: &str) -> Arc<Element> {
    Queue::new(name, DEFAULT_CAPACITY).0
}

inventory::submit! {
    ElementFactoryEntry {
        type_name: "streamforge.queue",
        constructor: construct,
    }
}
