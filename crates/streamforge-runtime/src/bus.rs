//! Ordered event queue shared by a pipeline and its elements.
//!
//! Watchers run synchronously on the poster's thread and can veto queuing;
//! the queue itself is drained by whoever calls `wait_message`/`poll_message`
//! (normally the pipeline's dispatch thread).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use streamforge_core::event::Event;

pub type Watcher = Box<dyn Fn(&Event, &mut bool) + Send + Sync>;

/// Opaque token returned by `add_watcher`, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherToken(u64);

struct WatcherEntry {
    token: WatcherToken,
    watcher: Watcher,
}

pub struct EventBus {
    queue: Mutex<VecDeque<Event>>,
    condvar: Condvar,
    watchers: Mutex<Vec<WatcherEntry>>,
    next_token: Mutex<u64>,
}

impl EventBus {
    pub fn new() -> Arc<EventBus> {
        Arc::new(EventBus {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            watchers: Mutex::new(Vec::new()),
            next_token: Mutex::new(1),
        })
    }

    /// Push `event` onto the queue, first giving every watcher (in
    /// registration order) a chance to set `drop = true` and suppress it.
    pub fn post_message(&self, event: Event) {
        {
            let watchers = self.watchers.lock();
            let mut drop_it = false;
            for entry in watchers.iter() {
                (entry.watcher)(&event, &mut drop_it);
                if drop_it {
                    return;
                }
            }
        }
        let mut q = self.queue.lock();
        q.push_back(event);
        self.condvar.notify_all();
    }

    pub fn add_watcher<F>(&self, watcher: F) -> WatcherToken
    where
        F: Fn(&Event, &mut bool) + Send + Sync + 'static,
    {
        let mut next = self.next_token.lock();
        let token = WatcherToken(*next);
        *next += 1;
        self.watchers.lock().push(WatcherEntry {
            token,
            watcher: Box::new(watcher),
        });
        token
    }

    pub fn remove_watcher(&self, token: WatcherToken) {
        self.watchers.lock().retain(|e| e.token != token);
    }

    /// Block until a message is available or `timeout` elapses.
    /// `timeout == Some(Duration::ZERO)` polls without blocking.
    pub fn wait_message(&self, timeout: Option<Duration>) -> Option<Event> {
        let mut q = self.queue.lock();
        if q.is_empty() {
            match timeout {
                Some(d) if d.is_zero() => return None,
                Some(d) => {
                    self.condvar.wait_for(&mut q, d);
                }
                None => self.condvar.wait(&mut q),
            }
        }
        q.pop_front()
    }

    pub fn poll_message(&self) -> Option<Event> {
        self.wait_message(Some(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::event::Event;

    #[test]
    fn ordering_is_fifo() {
        let bus = EventBus::new();
        bus.post_message(Event::PipelineWakeup);
        bus.post_message(Event::PlaybackPause {
            sender: "a".into(),
            ticks: 1,
        });
        bus.post_message(Event::PlaybackResume {
            sender: "a".into(),
            ticks: 2,
        });

        assert!(matches!(bus.poll_message(), Some(Event::PipelineWakeup)));
        assert!(matches!(bus.poll_message(), Some(Event::PlaybackPause { .. })));
        assert!(matches!(bus.poll_message(), Some(Event::PlaybackResume { .. })));
        assert!(bus.poll_message().is_none());
    }

    #[test]
    fn watcher_can_drop_message() {
        let bus = EventBus::new();
        bus.add_watcher(|event, drop_it| {
            if matches!(event, Event::PipelineWakeup) {
                *drop_it = true;
            }
        });
        bus.post_message(Event::PipelineWakeup);
        assert!(bus.poll_message().is_none());
    }

    #[test]
    fn removed_watcher_no_longer_runs() {
        let bus = EventBus::new();
        let token = bus.add_watcher(|_event, drop_it| *drop_it = true);
        bus.remove_watcher(token);
        bus.post_message(Event::PipelineWakeup);
        assert!(bus.poll_message().is_some());
    }
}
