use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};

/// `rw` counts active readers; -1 marks an active writer, 0 is idle.
#[derive(Default)]
struct State {
    rw: i64,
    writes_waiting: usize,
}

/// Reader/writer lock that prioritizes writers: once a writer is waiting,
/// new readers queue behind it until every pending writer has drained.
///
/// Not reentrant. Acquiring it twice on one thread deadlocks.
pub struct RwLock<T> {
    state: Mutex<State>,
    readers_ok: Condvar,
    writers_ok: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: the acquire/release protocol below serializes access to `data`:
// shared references are only handed out while rw > 0, the exclusive
// reference only while rw == -1, and the two states never overlap.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(State::default()),
            readers_ok: Condvar::new(),
            writers_ok: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut state = self.state.lock();
        while state.rw < 0 || state.writes_waiting > 0 {
            self.readers_ok.wait(&mut state);
        }
        state.rw += 1;
        drop(state);
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.state.lock();
        while state.rw != 0 {
            state.writes_waiting += 1;
            self.writers_ok.wait(&mut state);
            state.writes_waiting -= 1;
        }
        state.rw = -1;
        drop(state);
        WriteGuard { lock: self }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if state.rw < 0 {
            state.rw = 0;
        } else {
            state.rw -= 1;
        }
        let wake_writer = state.writes_waiting > 0 && state.rw == 0;
        let wake_readers = state.writes_waiting == 0;
        drop(state);
        if wake_writer {
            self.writers_ok.notify_one();
        } else if wake_readers {
            self.readers_ok.notify_all();
        }
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub struct ReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: rw > 0 for as long as this guard lives, so no writer exists.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

pub struct WriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: rw == -1 for as long as this guard lives; access is exclusive.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: rw == -1 for as long as this guard lives; access is exclusive.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn readers_share_access() {
        let lock = Arc::new(RwLock::new(0u32));
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let guard = lock.read();
                    // Only passes if all four readers hold the lock at once.
                    barrier.wait();
                    assert_eq!(*guard, 0);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn writers_are_exclusive() {
        let lock = Arc::new(RwLock::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut guard = lock.write();
                        *guard += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*lock.read(), 8000);
    }

    #[test]
    fn queued_writer_blocks_new_readers() {
        let lock = Arc::new(RwLock::new(0u32));
        let (tx, rx) = mpsc::channel::<&'static str>();

        let held = lock.read();

        let writer = {
            let lock = Arc::clone(&lock);
            let tx = tx.clone();
            thread::spawn(move || {
                let mut guard = lock.write();
                tx.send("writer").unwrap();
                *guard = 1;
            })
        };
        // Give the writer time to queue up behind the held read lock.
        thread::sleep(Duration::from_millis(100));

        let reader = {
            let lock = Arc::clone(&lock);
            let tx = tx.clone();
            thread::spawn(move || {
                let guard = lock.read();
                tx.send("reader").unwrap();
                assert_eq!(*guard, 1);
            })
        };
        thread::sleep(Duration::from_millis(100));

        // Neither may get in while the first read guard is held.
        assert!(rx.try_recv().is_err());

        drop(held);
        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(rx.recv().unwrap(), "writer");
        assert_eq!(rx.recv().unwrap(), "reader");
    }

    #[test]
    fn write_then_read_sees_update() {
        let lock = RwLock::new(Vec::new());
        lock.write().push(42);
        assert_eq!(*lock.read(), vec![42]);
    }

    #[test]
    fn guard_released_on_panic() {
        let lock = Arc::new(RwLock::new(0u32));
        let panicking = Arc::clone(&lock);
        let result = thread::spawn(move || {
            let _guard = panicking.write();
            panic!("poisoned on purpose");
        })
        .join();
        assert!(result.is_err());

        // The unwound guard must have released the lock.
        *lock.write() = 7;
        assert_eq!(*lock.read(), 7);
    }
}
