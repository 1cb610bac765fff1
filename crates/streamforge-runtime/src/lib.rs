// crates/streamforge-runtime/src/lib.rs
//
// The live machinery built on top of streamforge-core's plain data types:
// threads, pads, elements, containers, the bus, the clock controller, and
// the process-wide element factory. Concrete elements (queues, sinks,
// demuxers, decoders) live in streamforge-elements and depend on this crate.

pub mod bus;
pub mod clock;
pub mod container;
pub mod context;
pub mod element;
pub mod factory;
pub mod pad;
pub mod pipeline;
pub mod thread;
pub mod time;

pub use bus::{EventBus, WatcherToken};
pub use clock::{ExternalClock, MediaClock, MediaController};
pub use container::{dump_topology, has_cycle, topology_sort, Container};
pub use context::Context;
pub use element::{Element, ElementDelegate};
pub use factory::{create_element, registered_type_names, ElementFactoryEntry};
pub use pad::{DataCallback, EventCallback, Pad, PadKind, WeakPad};
pub use pipeline::Pipeline;
pub use thread::{msleep, usleep, Thread, ThreadPriority, ThreadRef};
