//! Lazily-initialized process-wide handle.
//!
//! The first caller constructs the value under a mutex; every later caller
//! gets the same `Arc` through a lock-free fast path. A failed construction
//! stores nothing, so the next caller tries again. The value lives until
//! process exit.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

pub struct Singleton<T> {
    cell: OnceLock<Arc<T>>,
    init_lock: Mutex<()>,
}

impl<T> Singleton<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }

        let value = Arc::new(init()?);
        // Only the lock holder ever sets the cell.
        let _ = self.cell.set(value.clone());
        Ok(value)
    }
}

impl<T> Default for Singleton<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn concurrent_first_access_constructs_once() {
        static CELL: Singleton<usize> = Singleton::new();
        static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    CELL.get_or_try_init(|| {
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok::<_, ()>(CONSTRUCTED.fetch_add(1, Ordering::SeqCst))
                    })
                    .unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[test]
    fn failed_init_stores_nothing() {
        let cell: Singleton<String> = Singleton::new();
        let err = cell.get_or_try_init(|| Err::<String, _>("no runtime"));
        assert_eq!(err.unwrap_err(), "no runtime");
        assert!(cell.get().is_none());

        let value = cell
            .get_or_try_init(|| Ok::<_, &str>("ready".to_string()))
            .unwrap();
        assert_eq!(*value, "ready");
        assert!(cell.get().is_some());
    }
}
