//! Hierarchical, reentrant read/write locks over resource paths
//!
//! Paths form the hierarchy `volume < volume/bucket < volume/bucket/key`.
//! A lock only covers its exact path; callers compose hierarchy semantics
//! by taking locks from coarse to fine (bucket before key). The manager
//! neither reorders nor detects ordering violations.
//!
//! Locks are owned by the acquiring thread. A thread holding a lock may
//! take the same path again in read mode, or in write mode when it is the
//! only holder. Two threads that both hold a read lock and both ask for
//! write on the same path deadlock, like any ordering violation.
//!
//! Release happens when the returned [`ResourceLockGuard`] is dropped, on
//! every exit path.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use tracing::trace;

/// Lock mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Shared
    Read,
    /// Exclusive
    Write,
}

/// Hierarchical resource name: `/volume`, `/volume/bucket` or `/volume/bucket/key`
///
/// Callers pass validated names (no `/` in volume or bucket), so distinct
/// name triples never share a path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath(String);

impl ResourcePath {
    #[must_use]
    pub fn volume(volume: &str) -> Self {
        Self(format!("/{volume}"))
    }

    #[must_use]
    pub fn bucket(volume: &str, bucket: &str) -> Self {
        Self(format!("/{volume}/{bucket}"))
    }

    #[must_use]
    pub fn key(volume: &str, bucket: &str, key: &str) -> Self {
        Self(format!("/{volume}/{bucket}/{key}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourcePath({:?})", self.0)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct LockState {
    /// Hold count per reading thread
    readers: HashMap<ThreadId, usize>,
    /// Writing thread and its hold count
    writer: Option<(ThreadId, usize)>,
}

impl LockState {
    fn can_grant(&self, mode: LockMode, me: ThreadId) -> bool {
        let writer_ok = self.writer.is_none_or(|(owner, _)| owner == me);
        match mode {
            LockMode::Read => writer_ok,
            LockMode::Write => writer_ok && self.readers.keys().all(|t| *t == me),
        }
    }

    fn grant(&mut self, mode: LockMode, me: ThreadId) {
        match mode {
            LockMode::Read => *self.readers.entry(me).or_insert(0) += 1,
            LockMode::Write => match &mut self.writer {
                Some((_, count)) => *count += 1,
                None => self.writer = Some((me, 1)),
            },
        }
    }

    fn release(&mut self, mode: LockMode, me: ThreadId) {
        match mode {
            LockMode::Read => {
                if let Some(count) = self.readers.get_mut(&me) {
                    *count -= 1;
                    if *count == 0 {
                        self.readers.remove(&me);
                    }
                }
            }
            LockMode::Write => {
                if let Some((_, count)) = &mut self.writer {
                    *count -= 1;
                    if *count == 0 {
                        self.writer = None;
                    }
                }
            }
        }
    }

    fn is_free(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none()
    }
}

/// Grants shared/exclusive access to resource paths
#[derive(Default)]
pub struct ResourceLockManager {
    locks: Mutex<HashMap<ResourcePath, LockState>>,
    released: Condvar,
}

impl ResourceLockManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `path` can be held in `mode` by the calling thread
    pub fn acquire(&self, path: ResourcePath, mode: LockMode) -> ResourceLockGuard<'_> {
        let me = thread::current().id();
        let mut locks = self.locks.lock();
        while !locks.get(&path).is_none_or(|s| s.can_grant(mode, me)) {
            self.released.wait(&mut locks);
        }
        locks.entry(path.clone()).or_default().grant(mode, me);
        drop(locks);

        trace!("acquired {:?} lock on {}", mode, path);
        ResourceLockGuard {
            manager: self,
            path,
            mode,
            owner: me,
            _not_send: PhantomData,
        }
    }

    pub fn read(&self, path: ResourcePath) -> ResourceLockGuard<'_> {
        self.acquire(path, LockMode::Read)
    }

    pub fn write(&self, path: ResourcePath) -> ResourceLockGuard<'_> {
        self.acquire(path, LockMode::Write)
    }

    /// Whether any thread holds `path` in any mode
    #[must_use]
    pub fn is_locked(&self, path: &ResourcePath) -> bool {
        self.locks.lock().contains_key(path)
    }

    /// Number of distinct threads holding `path` for reading
    #[must_use]
    pub fn reader_count(&self, path: &ResourcePath) -> usize {
        self.locks.lock().get(path).map_or(0, |s| s.readers.len())
    }

    #[must_use]
    pub fn is_write_locked(&self, path: &ResourcePath) -> bool {
        self.locks
            .lock()
            .get(path)
            .is_some_and(|s| s.writer.is_some())
    }

    fn release(&self, path: &ResourcePath, mode: LockMode, owner: ThreadId) {
        let mut locks = self.locks.lock();
        if let Some(state) = locks.get_mut(path) {
            state.release(mode, owner);
            if state.is_free() {
                locks.remove(path);
            }
        }
        drop(locks);
        self.released.notify_all();
        trace!("released {:?} lock on {}", mode, path);
    }
}

/// Held lock; released on drop. Not `Send`: a lock belongs to the thread
/// that took it.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ResourceLockGuard<'a> {
    manager: &'a ResourceLockManager,
    path: ResourcePath,
    mode: LockMode,
    owner: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl ResourceLockGuard<'_> {
    #[must_use]
    pub const fn path(&self) -> &ResourcePath {
        &self.path
    }

    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for ResourceLockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.path, self.mode, self.owner);
    }
}

impl fmt::Debug for ResourceLockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLockGuard")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    fn bucket() -> ResourcePath {
        ResourcePath::bucket("vol1", "bucket1")
    }

    #[test]
    fn test_paths() {
        assert_eq!(ResourcePath::volume("vol1").as_str(), "/vol1");
        assert_eq!(bucket().as_str(), "/vol1/bucket1");
        assert_eq!(
            ResourcePath::key("vol1", "bucket1", "key1").to_string(),
            "/vol1/bucket1/key1"
        );
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = ResourceLockManager::new();
        {
            let guard = locks.write(bucket());
            assert_eq!(guard.mode(), LockMode::Write);
            assert!(locks.is_write_locked(&bucket()));
        }
        assert!(!locks.is_locked(&bucket()));
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        fn failing(locks: &ResourceLockManager) -> Result<(), String> {
            let _guard = locks.write(bucket());
            let step: Result<u32, String> = Err("boom".to_string());
            step?;
            Ok(())
        }

        let locks = ResourceLockManager::new();
        assert!(failing(&locks).is_err());
        assert!(!locks.is_locked(&bucket()));
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let locks = Arc::new(ResourceLockManager::new());
        let l = Arc::clone(&locks);
        let result = std::thread::spawn(move || {
            let _guard = l.write(bucket());
            panic!("operation aborted");
        })
        .join();
        assert!(result.is_err());
        assert!(!locks.is_locked(&bucket()));
    }

    #[test]
    fn test_reentrant() {
        let locks = ResourceLockManager::new();
        let w1 = locks.write(bucket());
        let w2 = locks.write(bucket());
        let r = locks.read(bucket());
        drop(r);
        drop(w2);
        assert!(locks.is_write_locked(&bucket()));
        drop(w1);
        assert!(!locks.is_locked(&bucket()));

        let r1 = locks.read(bucket());
        let r2 = locks.read(bucket());
        assert_eq!(locks.reader_count(&bucket()), 1);
        // Sole reader may take the write lock too
        let w = locks.write(bucket());
        drop(w);
        drop(r1);
        drop(r2);
        assert!(!locks.is_locked(&bucket()));
    }

    #[test]
    fn test_shared_readers() {
        let locks = Arc::new(ResourceLockManager::new());
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let _g = locks.read(bucket());
                    // All four must hold the read lock at once to pass
                    barrier.wait();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(!locks.is_locked(&bucket()));
    }

    #[test]
    fn test_writer_excludes_readers() {
        let locks = Arc::new(ResourceLockManager::new());
        let reader_done = Arc::new(AtomicBool::new(false));

        let guard = locks.write(bucket());
        let handle = {
            let locks = Arc::clone(&locks);
            let reader_done = Arc::clone(&reader_done);
            std::thread::spawn(move || {
                let _g = locks.read(bucket());
                reader_done.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!reader_done.load(Ordering::SeqCst));
        drop(guard);
        handle.join().unwrap();
        assert!(reader_done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_writers_are_exclusive() {
        let locks = Arc::new(ResourceLockManager::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let _g = locks.write(bucket());
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unrelated_paths_do_not_block() {
        let locks = Arc::new(ResourceLockManager::new());
        let _k1 = locks.write(ResourcePath::key("vol1", "bucket1", "key1"));

        let l = Arc::clone(&locks);
        std::thread::spawn(move || {
            let _b = l.read(bucket());
            let _k2 = l.write(ResourcePath::key("vol1", "bucket1", "key2"));
        })
        .join()
        .unwrap();
    }
}
