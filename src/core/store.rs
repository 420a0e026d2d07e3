use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared handle to an immutable store snapshot.
///
/// Readers take a cheap [`Arc`] snapshot with [`Shared::load`] and keep using it
/// for the rest of the request. A reload builds a complete new store and
/// [`Shared::swap`]s it in, so a reader never sees a store that is half
/// replaced. The lock only guards the pointer, never the store contents.
pub struct Shared<T> {
    current: Arc<RwLock<Arc<T>>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    pub fn load(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the store wholesale, returning the previous snapshot.
    pub fn swap(&self, value: T) -> Arc<T> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(value))
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_keeps_old_snapshot_alive() {
        let shared = Shared::new(vec![1, 2, 3]);
        let before = shared.load();

        let previous = shared.swap(vec![4]);

        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*previous, vec![1, 2, 3]);
        assert_eq!(*shared.load(), vec![4]);
    }

    #[test]
    fn clones_observe_swaps() {
        let shared = Shared::new(String::from("a"));
        let other = shared.clone();

        other.swap(String::from("b"));

        assert_eq!(shared.load().as_str(), "b");
    }
}
