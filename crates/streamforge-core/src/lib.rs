// crates/streamforge-core/src/lib.rs
//
// Plain data types shared by every other crate in the workspace: errors,
// states, properties, formats, events, resources. No threads, no I/O — just
// the vocabulary the rest of the pipeline is built from.

pub mod clock;
pub mod error;
pub mod event;
pub mod format;
pub mod keys;
pub mod property;
pub mod resource;
pub mod state;

pub use clock::ClockType;
pub use error::{Error, ErrorClass, Result};
pub use event::{Event, Ticks};
pub use format::{PixelFormat, SampleFormat};
pub use property::Property;
pub use resource::{FrameKind, MediaFrame, MediaPacket, Resource};
pub use state::{compute_state_changes, State, StateChange};
