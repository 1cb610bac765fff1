//! Cooperative worker thread: a private task queue plus an interruptible
//! sleep. This is the framework's sole cancellation/backpressure primitive —
//! every blocking wait in this crate (queue backpressure, sink pacing,
//! `waitTask`) is built out of `msleep`/`usleep` so a state change or a
//! posted task always wins over a timed wait.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use streamforge_core::error::{Error, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
    RealTime,
}

struct Inner {
    queue: Mutex<VecDeque<Task>>,
    condvar: Condvar,
    idle: AtomicBool,
    running: AtomicBool,
    name: Mutex<String>,
}

thread_local! {
    static CURRENT: RefCell<Option<ThreadRef>> = RefCell::new(None);
}

/// A lightweight, cloneable handle to a worker's task queue. Does not own
/// the worker's OS thread — dropping the last `ThreadRef` does not join
/// anything. Returned by [`ThreadRef::current`] and usable to post tasks
/// back onto the thread that is currently running.
#[derive(Clone)]
pub struct ThreadRef(Arc<Inner>);

impl ThreadRef {
    /// The worker bound to the calling OS thread, or `None` if the caller is
    /// not running inside a `Thread`'s loop (e.g. the process's main thread).
    pub fn current() -> Option<ThreadRef> {
        CURRENT.with(|c| c.borrow().clone())
    }

    pub fn name(&self) -> String {
        self.0.name.lock().clone()
    }

    pub fn is_idle(&self) -> bool {
        self.0.idle.load(Ordering::Acquire)
    }

    /// Enqueue `task` and return without waiting for it to run.
    pub fn post_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut q = self.0.queue.lock();
        q.push_back(Box::new(task));
        self.0.condvar.notify_all();
    }

    /// Enqueue `task` and block until it has run. A panic inside `task` is
    /// caught and re-raised on the calling thread.
    pub fn send_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let done = Arc::new((Mutex::new(None::<std::result::Result<(), Box<dyn Any + Send>>>), Condvar::new()));
        let done2 = done.clone();
        self.post_task(move || {
            let result = catch_unwind(AssertUnwindSafe(task));
            let (lock, cvar) = &*done2;
            *lock.lock() = Some(result.map_err(|e| e));
            cvar.notify_all();
        });
        let (lock, cvar) = &*done;
        let mut guard = lock.lock();
        while guard.is_none() {
            cvar.wait(&mut guard);
        }
        match guard.take().unwrap() {
            Ok(()) => {}
            Err(payload) => resume_unwind(payload),
        }
    }

    /// Typed wrapper around `send_task` for callables with a return value.
    pub fn invoke_queued<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let slot: Arc<Mutex<Option<R>>> = Arc::new(Mutex::new(None));
        let slot2 = slot.clone();
        self.send_task(move || {
            *slot2.lock() = Some(f());
        });
        slot.lock().take().expect("send_task waits for completion")
    }

    /// Drain and run every task currently queued, without waiting for more.
    /// Returns the number of tasks processed.
    pub fn dispatch_task(&self) -> usize {
        let mut n = 0;
        loop {
            let task = {
                let mut q = self.0.queue.lock();
                q.pop_front()
            };
            match task {
                Some(t) => {
                    t();
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Block until at least one task is queued (or `timeout` elapses), then
    /// drain the queue. `timeout == None` blocks indefinitely.
    pub fn wait_task(&self, timeout: Option<Duration>) -> usize {
        {
            let mut q = self.0.queue.lock();
            if q.is_empty() {
                match timeout {
                    None => self.0.condvar.wait(&mut q),
                    Some(d) => {
                        self.0.condvar.wait_for(&mut q, d);
                    }
                }
            }
        }
        self.dispatch_task()
    }
}

/// An owned worker thread. Dropping it posts a shutdown task and joins the
/// OS thread, mirroring the teacher's RAII shutdown pattern.
pub struct Thread {
    handle: ThreadRef,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl std::ops::Deref for Thread {
    type Target = ThreadRef;
    fn deref(&self) -> &ThreadRef {
        &self.handle
    }
}

impl Thread {
    pub fn new() -> Thread {
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            idle: AtomicBool::new(true),
            running: AtomicBool::new(true),
            name: Mutex::new("streamforge-worker".to_owned()),
        });
        let handle = ThreadRef(inner.clone());
        let loop_ref = ThreadRef(inner);
        let join = std::thread::Builder::new()
            .name(loop_ref.name())
            .spawn(move || run_loop(loop_ref))
            .expect("spawn worker thread");
        Thread {
            handle,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.handle.0.name.lock() = name.into();
    }

    /// Best-effort OS priority hint; a no-op on platforms without a simple
    /// equivalent, matching the original's Windows-only implementation.
    pub fn set_priority(&self, _priority: ThreadPriority) {}

    pub fn handle(&self) -> ThreadRef {
        self.handle.clone()
    }
}

impl Default for Thread {
    fn default() -> Self {
        Thread::new()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.handle.0.running.store(false, Ordering::Release);
        // Wake the loop even if the queue is empty so it observes `running == false`.
        {
            let _q = self.handle.0.queue.lock();
            self.handle.0.condvar.notify_all();
        }
        if let Some(join) = self.join.lock().take() {
            let _ = join.join();
        }
    }
}

fn run_loop(thread: ThreadRef) {
    CURRENT.with(|c| *c.borrow_mut() = Some(thread.clone()));
    loop {
        thread.0.idle.store(false, Ordering::Release);
        thread.dispatch_task();
        thread.0.idle.store(true, Ordering::Release);
        if !thread.0.running.load(Ordering::Acquire) {
            break;
        }
        let mut q = thread.0.queue.lock();
        if q.is_empty() && thread.0.running.load(Ordering::Acquire) {
            thread.0.condvar.wait(&mut q);
        }
    }
}

/// Sleep for `duration`, returning early with `Error::Interrupted` if a task
/// is posted to the calling thread's worker before `duration` elapses. On a
/// thread with no bound `Thread` (e.g. the process's main thread), this is
/// an ordinary uninterruptible sleep.
pub fn msleep(duration: Duration) -> Result<()> {
    let Some(current) = ThreadRef::current() else {
        std::thread::sleep(duration);
        return Ok(());
    };
    let deadline = Instant::now() + duration;
    let mut q = current.0.queue.lock();
    loop {
        if !q.is_empty() {
            return Err(Error::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        let timed_out = current.0.condvar.wait_for(&mut q, deadline - now).timed_out();
        if !timed_out {
            // Woken before the deadline: either a task arrived, or a spurious
            // wakeup. Loop re-checks the queue either way.
            continue;
        }
        return Ok(());
    }
}

pub fn usleep(micros: u64) -> Result<()> {
    msleep(Duration::from_micros(micros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn post_and_dispatch_runs_fifo() {
        let t = Thread::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            t.send_task(move || order.lock().push(i));
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn invoke_queued_returns_value() {
        let t = Thread::new();
        let v = t.invoke_queued(|| 21 * 2);
        assert_eq!(v, 42);
    }

    #[test]
    fn send_task_rethrows_panic() {
        let t = Thread::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            t.send_task(|| panic!("boom"));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn msleep_is_interrupted_by_posted_task() {
        let t = Thread::new();
        let woke_early = Arc::new(AtomicBool::new(false));
        let counter = Arc::new(AtomicU32::new(0));
        let woke_early2 = woke_early.clone();
        let counter2 = counter.clone();
        t.post_task(move || {
            let start = Instant::now();
            // Give the second post_task below a moment to land.
            let first = msleep(Duration::from_millis(5));
            assert!(first.is_ok());
            let result = msleep(Duration::from_secs(2));
            if result == Err(Error::Interrupted) && start.elapsed() < Duration::from_secs(1) {
                woke_early2.store(true, Ordering::Release);
            }
            counter2.fetch_add(1, Ordering::Release);
        });
        std::thread::sleep(Duration::from_millis(20));
        t.post_task(|| {});
        // Give the worker a moment to process both tasks.
        std::thread::sleep(Duration::from_millis(50));
        assert!(woke_early.load(Ordering::Acquire));
    }
}
