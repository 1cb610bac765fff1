//! Process-wide element factory.
//!
//! The original relies on a static-constructor macro (`NEKO_REGISTER_ELEMENT`)
//! that runs at module load time via a linker attribute. `inventory` is the
//! idiomatic Rust equivalent: each concrete element submits a
//! `ElementFactoryEntry` at compile time via `inventory::submit!`, and this
//! module collects them into a name-keyed lookup built lazily on first use.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use streamforge_core::error::{Error, Result};

use crate::element::Element;

pub type Constructor = fn(name: &str) -> Arc<Element>;

/// One static registration, collected by `inventory` across the whole
/// dependency graph at link time.
pub struct ElementFactoryEntry {
    pub type_name: &'static str,
    pub constructor: Constructor,
}

inventory::collect!(ElementFactoryEntry);

fn registry() -> &'static HashMap<&'static str, Constructor> {
    static REGISTRY: OnceLock<HashMap<&'static str, Constructor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        inventory::iter::<ElementFactoryEntry>()
            .map(|e| (e.type_name, e.constructor))
            .collect()
    })
}

/// Construct an element previously registered under `type_name` with
/// `inventory::submit!`, naming the new instance `instance_name`.
pub fn create_element(type_name: &str, instance_name: &str) -> Result<Arc<Element>> {
    registry()
        .get(type_name)
        .map(|ctor| ctor(instance_name))
        .ok_or(Error::NoImpl)
}

pub fn registered_type_names() -> Vec<&'static str> {
    registry().keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementDelegate;

    struct Noop;
    impl ElementDelegate for Noop {}

    fn make_noop(name: &str) -> Arc<Element> {
        Element::new_non_threaded(name, Arc::new(Noop))
    }

    inventory::submit! {
        ElementFactoryEntry {
            type_name: "test.noop",
            constructor: make_noop,
        }
    }

    #[test]
    fn registered_element_is_constructible_by_name() {
        assert!(registered_type_names().contains(&"test.noop"));
        let element = create_element("test.noop", "my-noop").unwrap();
        assert_eq!(element.name(), "my-noop");
    }

    #[test]
    fn unknown_type_name_is_no_impl() {
        assert_eq!(create_element("does.not.exist", "x").unwrap_err(), Error::NoImpl);
    }
}
