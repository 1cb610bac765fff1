//! Thread-safe, type-identity-keyed object registry shared by a pipeline and
//! every element in its tree.
//!
//! Objects are looked up by `TypeId`, mirroring the original's
//! `std::type_index`-keyed map, but storage here is insertion-ordered rather
//! than sorted by type: teardown must run cleanup closures in reverse
//! insertion order, since later-registered objects (e.g. a device opened
//! after the clock that depends on it) may hold references into
//! earlier-registered ones.

use std::any::{Any, TypeId};
use std::sync::Arc;

use parking_lot::RwLock;

type Cleanup = Box<dyn FnOnce() + Send>;

struct Entry {
    type_id: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    cleanup: Option<Cleanup>,
}

#[derive(Default)]
pub struct Context {
    entries: RwLock<Vec<Entry>>,
}

impl Context {
    pub fn new() -> Arc<Context> {
        Arc::new(Context::default())
    }

    /// Register `value` under its own type. If an object of the same type
    /// is already registered it is replaced (its cleanup, if any, runs
    /// immediately).
    pub fn add_object<T>(&self, value: Arc<T>, cleanup: Option<Cleanup>)
    where
        T: Any + Send + Sync,
    {
        let type_id = TypeId::of::<T>();
        let mut entries = self.entries.write();
        if let Some(pos) = entries.iter().position(|e| e.type_id == type_id) {
            if let Some(old_cleanup) = entries.remove(pos).cleanup {
                old_cleanup();
            }
        }
        entries.push(Entry {
            type_id,
            value,
            cleanup,
        });
    }

    /// Remove the registered object of type `T`, running its cleanup if any.
    /// Returns `true` if an object was present.
    pub fn remove_object<T>(&self) -> bool
    where
        T: Any + Send + Sync,
    {
        let type_id = TypeId::of::<T>();
        let mut entries = self.entries.write();
        if let Some(pos) = entries.iter().position(|e| e.type_id == type_id) {
            if let Some(cleanup) = entries.remove(pos).cleanup {
                cleanup();
            }
            true
        } else {
            false
        }
    }

    pub fn query_object<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let type_id = TypeId::of::<T>();
        let entries = self.entries.read();
        entries
            .iter()
            .find(|e| e.type_id == type_id)
            .and_then(|e| e.value.clone().downcast::<T>().ok())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let mut entries = self.entries.write();
        while let Some(entry) = entries.pop() {
            if let Some(cleanup) = entry.cleanup {
                cleanup();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn query_returns_registered_object() {
        let ctx = Context::new();
        ctx.add_object(Arc::new(42u32), None);
        assert_eq!(*ctx.query_object::<u32>().unwrap(), 42);
        assert!(ctx.query_object::<u64>().is_none());
    }

    #[test]
    fn cleanup_runs_in_reverse_insertion_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let ctx = Context::new();
            let o1 = order.clone();
            ctx.add_object(Arc::new(1u32), Some(Box::new(move || o1.lock().push(1))));
            // A distinct type so the second registration doesn't replace the first.
            struct Marker;
            let o2 = order.clone();
            ctx.add_object(Arc::new(Marker), Some(Box::new(move || o2.lock().push(2))));
        }
        assert_eq!(*order.lock(), vec![2, 1]);
    }

    #[test]
    fn remove_runs_cleanup_once() {
        let ctx = Context::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        ctx.add_object(Arc::new(7u32), Some(Box::new(move || { c.fetch_add(1, Ordering::SeqCst); })));
        assert!(ctx.remove_object::<u32>());
        assert!(!ctx.remove_object::<u32>());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
