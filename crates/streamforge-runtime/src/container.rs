//! A container element holding a list of child elements, with topology
//! query helpers (Kahn's-algorithm sort, cycle detection, Mermaid dump).

use std::collections::HashMap;
use std::sync::Arc;

use streamforge_core::error::{Error, Result};
use streamforge_core::event::Event;
use streamforge_core::state::State;

use crate::bus::EventBus;
use crate::context::Context;
use crate::element::Element;

use parking_lot::Mutex;

pub struct Container {
    elements: Mutex<Vec<Arc<Element>>>,
}

impl Container {
    pub fn new() -> Container {
        Container {
            elements: Mutex::new(Vec::new()),
        }
    }

    /// Take shared ownership of `element`, inheriting `bus`/`context` into
    /// it. Fails if the element is not `Null`.
    pub fn add_element(&self, element: Arc<Element>, bus: Option<Arc<EventBus>>, context: Option<Arc<Context>>) -> Result<()> {
        if element.state() != State::Null {
            return Err(Error::InvalidState);
        }
        element.set_bus(bus)?;
        element.set_context(context)?;
        self.elements.lock().push(element);
        Ok(())
    }

    /// Transfer ownership of `element` back out, clearing its bus/context.
    pub fn detach_element(&self, element: &Arc<Element>) -> Result<()> {
        let mut elements = self.elements.lock();
        let pos = elements
            .iter()
            .position(|e| Arc::ptr_eq(e, element))
            .ok_or(Error::InvalidArguments)?;
        let removed = elements.remove(pos);
        removed.set_bus(None)?;
        removed.set_context(None)?;
        Ok(())
    }

    /// Iterate children in insertion order, stopping early if `cb` returns
    /// `false`.
    pub fn for_elements(&self, mut cb: impl FnMut(&Arc<Element>) -> bool) {
        for element in self.elements.lock().iter() {
            if !cb(element) {
                break;
            }
        }
    }

    pub fn size(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn elements(&self) -> Vec<Arc<Element>> {
        self.elements.lock().clone()
    }

    /// Apply a state change to every child, in topological order for
    /// forward moves and reverse topological order for teardown. Aborts at
    /// the first child that fails, leaving the container partially changed.
    pub fn set_state(&self, target: State) -> Result<()> {
        let mut ordered = topology_sort(&self.elements());
        if ordered.is_empty() && self.size() > 0 {
            return Err(Error::InvalidTopology);
        }
        let current = ordered.first().map(|e| e.state()).unwrap_or(target);
        if target < current {
            // Moving backward (e.g. toward Paused or Null): tear down
            // consumers before producers so a sink is never asked to stop
            // or pause while its source still feeds it.
            ordered.reverse();
        }
        for element in ordered {
            element.set_state(target)?;
        }
        Ok(())
    }

    pub fn send_event(&self, event: Event) -> Result<()> {
        for element in self.elements().iter() {
            element.send_event(event.clone())?;
        }
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}

/// Kahn's algorithm over the pad-link graph restricted to `elements`.
/// Returns an empty vec if the subgraph has a cycle (including one formed
/// with an element whose peer lies outside `elements`, which is simply
/// ignored as an edge).
pub fn topology_sort(elements: &[Arc<Element>]) -> Vec<Arc<Element>> {
    let members: HashMap<*const Element, Arc<Element>> =
        elements.iter().map(|e| (Arc::as_ptr(e), e.clone())).collect();

    let mut in_degree: HashMap<*const Element, usize> =
        members.keys().map(|k| (*k, 0)).collect();

    for element in elements {
        for pad in element.outputs() {
            if let Some(peer) = pad.peer() {
                // SAFETY-free: we only compare the pointer as an opaque key,
                // never dereference it outside the `members` lookup below.
                if let Some(next) = find_member(&members, peer.element_name(), elements) {
                    *in_degree.get_mut(&next).unwrap() += 1;
                }
            }
        }
    }

    let mut queue: Vec<*const Element> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(k, _)| *k)
        .collect();

    let mut ordered = Vec::new();
    let mut i = 0;
    while i < queue.len() {
        let current = queue[i];
        let elem = members[&current].clone();
        ordered.push(elem.clone());
        for pad in elem.outputs() {
            if let Some(peer) = pad.peer() {
                if let Some(next) = find_member(&members, peer.element_name(), elements) {
                    let deg = in_degree.get_mut(&next).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(next);
                    }
                }
            }
        }
        i += 1;
    }

    if ordered.len() == members.len() {
        ordered
    } else {
        Vec::new()
    }
}

/// Element names are not guaranteed unique across an arbitrary graph in
/// general, but within one container's member set (the only place this
/// runs) each element is constructed with a distinct name by convention;
/// resolve by name instead of pointer since `Pad` only remembers its
/// owning element's name, not its address.
fn find_member(
    members: &HashMap<*const Element, Arc<Element>>,
    name: &str,
    elements: &[Arc<Element>],
) -> Option<*const Element> {
    elements
        .iter()
        .find(|e| e.name() == name)
        .map(Arc::as_ptr)
        .filter(|p| members.contains_key(p))
}

/// True if `elements` (as a container's members) contain a cycle.
pub fn has_cycle(elements: &[Arc<Element>]) -> bool {
    topology_sort(elements).len() != elements.len()
}

/// Render the topology as a Mermaid `graph LR` diagram: sources (no inputs)
/// as `((circle))`, sinks (no outputs) as `{brace}`, everything else as
/// `[bracket]`.
pub fn dump_topology(elements: &[Arc<Element>]) -> String {
    let ordered = topology_sort(elements);
    if ordered.is_empty() {
        return String::new();
    }

    let mut ids: HashMap<String, String> = HashMap::new();
    let mut next_id = 1u32;
    let mut id_for = |name: &str, ids: &mut HashMap<String, String>| -> String {
        ids.entry(name.to_owned())
            .or_insert_with(|| {
                let id = next_id.to_string();
                next_id += 1;
                id
            })
            .clone()
    };

    let mark = |elem: &Arc<Element>| -> String {
        if elem.inputs().is_empty() {
            format!("(({}))", elem.name())
        } else if elem.outputs().is_empty() {
            format!("{{{}}}", elem.name())
        } else {
            format!("[{}]", elem.name())
        }
    };

    let mut out = String::from("graph LR\n");
    for elem in &ordered {
        let elem_id = id_for(elem.name(), &mut ids);
        for pad in elem.outputs() {
            let Some(peer) = pad.peer() else { continue };
            let next = match ordered.iter().find(|e| e.name() == peer.element_name()) {
                Some(e) => e,
                None => continue,
            };
            let next_id = id_for(next.name(), &mut ids);
            out.push_str(&format!(
                "    {elem_id}{} -- {} to {} --> {next_id}{}\n",
                mark(elem),
                pad.name(),
                peer.name(),
                mark(next)
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementDelegate;

    struct Noop;
    impl ElementDelegate for Noop {}

    fn make(name: &str) -> Arc<Element> {
        Element::new_non_threaded(name, Arc::new(Noop))
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let src = make("src");
        let mid = make("mid");
        let sink = make("sink");
        let out = src.add_output("src");
        let mid_in = mid.add_input("sink");
        let mid_out = mid.add_output("src");
        let sink_in = sink.add_input("sink");
        out.link(&mid_in).unwrap();
        mid_out.link(&sink_in).unwrap();

        let elements = vec![sink.clone(), src.clone(), mid.clone()];
        let order = topology_sort(&elements);
        let names: Vec<&str> = order.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["src", "mid", "sink"]);
    }

    #[test]
    fn cycle_is_detected() {
        let a = make("a");
        let b = make("b");
        let a_out = a.add_output("out");
        let a_in = a.add_input("in");
        let b_out = b.add_output("out");
        let b_in = b.add_input("in");
        a_out.link(&b_in).unwrap();
        b_out.link(&a_in).unwrap();

        let elements = vec![a, b];
        assert!(has_cycle(&elements));
        assert!(topology_sort(&elements).is_empty());
    }

    #[test]
    fn dump_topology_uses_shapes_by_arity() {
        let src = make("src");
        let sink = make("sink");
        let out = src.add_output("o");
        let inp = sink.add_input("i");
        out.link(&inp).unwrap();

        let diagram = dump_topology(&[src, sink]);
        assert!(diagram.starts_with("graph LR\n"));
        assert!(diagram.contains("((src))"));
        assert!(diagram.contains("{sink}"));
    }
}
