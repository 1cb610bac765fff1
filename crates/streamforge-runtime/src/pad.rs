//! Typed ports that connect elements.
//!
//! A pad holds only a *weak* reference to its peer: strong ownership of a
//! pad belongs entirely to the element that created it, so a live link
//! between two elements must never keep either element's pad tree alive by
//! itself. `unlink` (and element teardown) clears both sides.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::property::Property;
use streamforge_core::resource::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadKind {
    Input,
    Output,
}

impl PadKind {
    pub const SINK: PadKind = PadKind::Input;
    pub const SOURCE: PadKind = PadKind::Output;
}

pub type DataCallback = Box<dyn Fn(Resource) -> Result<()> + Send + Sync>;
pub type EventCallback = Box<dyn Fn(Event) -> Result<()> + Send + Sync>;

struct PadInner {
    element_name: String,
    kind: PadKind,
    name: String,
    peer: Mutex<Option<Weak<PadInner>>>,
    properties: Mutex<BTreeMap<String, Property>>,
    callback: Mutex<Option<DataCallback>>,
    event_callback: Mutex<Option<EventCallback>>,
}

/// A strong, cloneable handle to a pad. Cloning shares the same underlying
/// port; it does not create a second pad.
#[derive(Clone)]
pub struct Pad(Arc<PadInner>);

/// A non-owning reference to a pad, used for peer links so that linking two
/// pads never keeps either element alive via a reference cycle.
#[derive(Clone)]
pub struct WeakPad(Weak<PadInner>);

impl WeakPad {
    pub fn upgrade(&self) -> Option<Pad> {
        self.0.upgrade().map(Pad)
    }
}

impl Pad {
    pub fn new(element_name: impl Into<String>, kind: PadKind, name: impl Into<String>) -> Pad {
        Pad(Arc::new(PadInner {
            element_name: element_name.into(),
            kind,
            name: name.into(),
            peer: Mutex::new(None),
            properties: Mutex::new(BTreeMap::new()),
            callback: Mutex::new(None),
            event_callback: Mutex::new(None),
        }))
    }

    pub fn downgrade(&self) -> WeakPad {
        WeakPad(Arc::downgrade(&self.0))
    }

    pub fn kind(&self) -> PadKind {
        self.0.kind
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn element_name(&self) -> &str {
        &self.0.element_name
    }

    pub fn is_linked(&self) -> bool {
        self.0.peer.lock().is_some()
    }

    pub fn peer(&self) -> Option<Pad> {
        self.0.peer.lock().as_ref().and_then(WeakPad::upgrade).map(Pad::clone)
    }

    pub fn peer_element_name(&self) -> Option<String> {
        self.peer().map(|p| p.element_name().to_owned())
    }

    /// Link `self` (must be an output pad) to `target` (must be an input
    /// pad). Both sides are updated atomically from the caller's point of
    /// view; fails with `InvalidArguments` if the kinds don't match.
    pub fn link(&self, target: &Pad) -> Result<()> {
        if self.kind() != PadKind::Output || target.kind() != PadKind::Input {
            return Err(Error::InvalidArguments);
        }
        *self.0.peer.lock() = Some(target.downgrade());
        *target.0.peer.lock() = Some(self.downgrade());
        Ok(())
    }

    /// Clear the link on both ends. Idempotent.
    pub fn unlink(&self) {
        let mut my_peer = self.0.peer.lock();
        if let Some(weak) = my_peer.take() {
            if let Some(peer) = weak.upgrade() {
                *peer.0.peer.lock() = None;
            }
        }
    }

    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(Resource) -> Result<()> + Send + Sync + 'static,
    {
        *self.0.callback.lock() = Some(Box::new(callback));
    }

    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(Event) -> Result<()> + Send + Sync + 'static,
    {
        *self.0.event_callback.lock() = Some(Box::new(callback));
    }

    /// Valid only on an output pad: deliver `resource` to the linked input
    /// pad's data callback, synchronously, on the calling thread.
    pub fn push(&self, resource: Resource) -> Result<()> {
        if self.kind() != PadKind::Output {
            return Err(Error::InvalidState);
        }
        let peer = self.peer().ok_or(Error::NoLink)?;
        let cb = peer.0.callback.lock();
        match cb.as_ref() {
            Some(f) => f(resource),
            None => Err(Error::NoImpl),
        }
    }

    /// Valid only on an output pad: deliver `event` to the linked input
    /// pad's event callback.
    pub fn push_event(&self, event: Event) -> Result<()> {
        if self.kind() != PadKind::Output {
            return Err(Error::InvalidState);
        }
        let peer = self.peer().ok_or(Error::NoLink)?;
        let cb = peer.0.event_callback.lock();
        match cb.as_ref() {
            Some(f) => f(event),
            None => Err(Error::NoImpl),
        }
    }

    pub fn property(&self, name: &str) -> Property {
        self.0
            .properties
            .lock()
            .get(name)
            .cloned()
            .unwrap_or(Property::Null)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.0.properties.lock().contains_key(name)
    }

    pub fn add_property(&self, name: impl Into<String>, value: Property) {
        self.0.properties.lock().insert(name.into(), value);
    }

    pub fn remove_property(&self, name: &str) -> bool {
        self.0.properties.lock().remove(name).is_some()
    }

    pub fn clear_properties(&self) {
        self.0.properties.lock().clear();
    }

    pub fn properties_snapshot(&self) -> BTreeMap<String, Property> {
        self.0.properties.lock().clone()
    }
}

impl fmt::Debug for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pad")
            .field("element", &self.0.element_name)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("linked", &self.is_linked())
            .finish()
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.element_name, self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::resource::MediaPacket;

    #[test]
    fn link_requires_output_to_input() {
        let a = Pad::new("src", PadKind::Output, "out");
        let b = Pad::new("sink", PadKind::Input, "in");
        assert!(a.link(&b).is_ok());
        assert!(a.is_linked());
        assert!(b.is_linked());

        let c = Pad::new("other", PadKind::Output, "out");
        assert_eq!(c.link(&a), Err(Error::InvalidArguments));
    }

    #[test]
    fn unlink_clears_both_sides() {
        let a = Pad::new("src", PadKind::Output, "out");
        let b = Pad::new("sink", PadKind::Input, "in");
        a.link(&b).unwrap();
        a.unlink();
        assert!(!a.is_linked());
        assert!(!b.is_linked());
    }

    #[test]
    fn push_round_trips_to_peer_callback() {
        let a = Pad::new("src", PadKind::Output, "out");
        let b = Pad::new("sink", PadKind::Input, "in");
        a.link(&b).unwrap();

        let received = Arc::new(Mutex::new(None));
        let r2 = received.clone();
        b.set_callback(move |res| {
            *r2.lock() = Some(res);
            Ok(())
        });

        let packet = MediaPacket::new(0, 1.0, 0.1, vec![1, 2, 3]);
        a.push(packet.clone().into()).unwrap();
        let got = received.lock().take().unwrap();
        assert_eq!(got.as_packet().unwrap().data, packet.data);
    }

    #[test]
    fn push_without_link_fails() {
        let a = Pad::new("src", PadKind::Output, "out");
        let packet = MediaPacket::new(0, 0.0, 0.0, vec![]);
        assert_eq!(a.push(packet.into()), Err(Error::NoLink));
    }
}
