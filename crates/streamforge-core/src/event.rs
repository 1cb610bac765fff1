//! Control messages posted between elements and onto the pipeline bus.
//!
//! An `Event` is a plain tagged struct (no virtual dispatch needed in Rust —
//! the original's `Event::as<T>()` downcast collapses into ordinary enum
//! matching here). `sender` is the name of the element that raised it; it is
//! a name rather than a handle so events stay `'static` and cheap to clone
//! onto the bus queue.

use crate::error::Error;

/// Timestamp in milliseconds since an arbitrary epoch, used only for
/// relative comparisons (event ordering, clock diagnostics).
pub type Ticks = i64;

#[derive(Debug, Clone)]
pub enum Event {
    /// An element's state changed.
    StateChanged { sender: String, ticks: Ticks },

    /// An error was raised; see § error handling for propagation rules.
    ErrorOccurred {
        sender: String,
        error: Error,
        message: String,
        ticks: Ticks,
    },

    PadAdded { sender: String, pad: String, ticks: Ticks },
    PadRemoved { sender: String, pad: String, ticks: Ticks },
    PadLinked { sender: String, pad: String, ticks: Ticks },
    PadUnlinked { sender: String, pad: String, ticks: Ticks },

    PlaybackPause { sender: String, ticks: Ticks },
    PlaybackResume { sender: String, ticks: Ticks },

    /// A source/demuxer reached the end of the stream.
    MediaEndOfFile { sender: String, ticks: Ticks },

    /// Buffering progress, 0 (started) to 100 (finished) inclusive.
    MediaBuffering { sender: String, progress: u8, ticks: Ticks },

    /// Request to seek to an absolute position in seconds. Has no sender:
    /// it is injected by the user/player, not raised by an element.
    SeekRequested { position_secs: f64, ticks: Ticks },

    /// Request to drop all internally buffered resources (precedes/follows
    /// a seek, or is sent standalone to clear a stall).
    FlushRequested { sender: String, ticks: Ticks },

    /// The master clock's position changed by more than the pipeline's
    /// reporting threshold.
    ClockUpdated { sender: String, position_secs: f64, ticks: Ticks },

    /// Internal-use wakeup posted to the pipeline's own bus to unblock a
    /// `waitMessage` when something besides a new message needs attention.
    PipelineWakeup,

    /// Start of the user-extensible event range; application code can carry
    /// arbitrary payloads in the `name`/`payload` pair without the core
    /// needing to know about them.
    User { sender: String, name: String, payload: String, ticks: Ticks },
}

impl Event {
    pub fn sender(&self) -> Option<&str> {
        match self {
            Event::StateChanged { sender, .. }
            | Event::ErrorOccurred { sender, .. }
            | Event::PadAdded { sender, .. }
            | Event::PadRemoved { sender, .. }
            | Event::PadLinked { sender, .. }
            | Event::PadUnlinked { sender, .. }
            | Event::PlaybackPause { sender, .. }
            | Event::PlaybackResume { sender, .. }
            | Event::MediaEndOfFile { sender, .. }
            | Event::MediaBuffering { sender, .. }
            | Event::FlushRequested { sender, .. }
            | Event::ClockUpdated { sender, .. }
            | Event::User { sender, .. } => Some(sender),
            Event::SeekRequested { .. } | Event::PipelineWakeup => None,
        }
    }

    pub fn error_event(sender: impl Into<String>, error: Error, ticks: Ticks) -> Event {
        let message = error.to_string();
        Event::ErrorOccurred {
            sender: sender.into(),
            error,
            message,
            ticks,
        }
    }

    pub fn buffering(sender: impl Into<String>, progress: u8, ticks: Ticks) -> Event {
        debug_assert!(progress <= 100);
        Event::MediaBuffering {
            sender: sender.into(),
            progress: progress.min(100),
            ticks,
        }
    }
}
