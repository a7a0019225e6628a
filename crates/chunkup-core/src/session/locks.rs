//! Per-session locks.
//!
//! Registry of content hash -> async rwlock. Chunk writes hold it shared;
//! the assemble → verify → commit section holds it exclusively, so no chunk
//! lands in a session directory while it is being committed and removed.
//! Entries nobody holds or waits on are pruned on the next acquisition, so
//! the map only tracks live sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::hash::ContentHash;

/// Held while one task owns a session's completion path.
pub type SessionGuard = OwnedRwLockWriteGuard<()>;

/// Held while a chunk is written into a session.
pub type SharedGuard = OwnedRwLockReadGuard<()>;

#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<ContentHash, Arc<RwLock<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, hash: &ContentHash) -> Arc<RwLock<()>> {
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        // Strong count 1 means only the map refers to it: idle.
        map.retain(|k, m| k == hash || Arc::strong_count(m) > 1);
        Arc::clone(map.entry(hash.clone()).or_default())
    }

    /// Wait for and take the exclusive lock for `hash`.
    pub async fn lock(&self, hash: &ContentHash) -> SessionGuard {
        self.entry(hash).write_owned().await
    }

    /// Wait for and take a shared hold on `hash`; blocks while a commit runs.
    pub async fn share(&self, hash: &ContentHash) -> SharedGuard {
        self.entry(hash).read_owned().await
    }

    /// Take the exclusive lock only if nobody holds the session at all.
    pub fn try_lock(&self, hash: &ContentHash) -> Option<SessionGuard> {
        self.entry(hash).try_write_owned().ok()
    }

    /// True while some task holds (or waits for) the exclusive lock for `hash`.
    /// Shared holders alone do not count.
    pub fn is_locked(&self, hash: &ContentHash) -> bool {
        let map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        map.get(hash).is_some_and(|m| m.try_read().is_err())
    }

    /// Number of tracked sessions (held, awaited, or not yet pruned).
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> ContentHash {
        ContentHash::parse(s).unwrap()
    }

    #[tokio::test]
    async fn lock_excludes_second_holder() {
        let locks = SessionLocks::new();
        let guard = locks.lock(&h("aa")).await;
        assert!(locks.is_locked(&h("aa")));
        assert!(locks.try_lock(&h("aa")).is_none());
        assert!(locks.try_lock(&h("bb")).is_some());
        drop(guard);
        assert!(!locks.is_locked(&h("aa")));
        assert!(locks.try_lock(&h("aa")).is_some());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = SessionLocks::new();
        for name in ["aa", "bb", "cc"] {
            drop(locks.lock(&h(name)).await);
        }
        let _held = locks.lock(&h("dd")).await;
        assert_eq!(locks.tracked(), 1);
    }

    #[tokio::test]
    async fn shared_holders_coexist_but_exclude_commit() {
        let locks = SessionLocks::new();
        let a = locks.share(&h("aa")).await;
        let b = locks.share(&h("aa")).await;
        assert!(!locks.is_locked(&h("aa")));
        assert!(locks.try_lock(&h("aa")).is_none());
        drop((a, b));
        let exclusive = locks.try_lock(&h("aa"));
        assert!(exclusive.is_some());
        assert!(locks.is_locked(&h("aa")));
    }

    #[tokio::test]
    async fn writer_waits_for_commit() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.lock(&h("aa")).await;
        let l2 = Arc::clone(&locks);
        let writer = tokio::spawn(async move {
            let _g = l2.share(&h("aa")).await;
            true
        });
        tokio::task::yield_now().await;
        assert!(!writer.is_finished());
        drop(guard);
        assert!(writer.await.unwrap());
    }

    #[tokio::test]
    async fn waiter_gets_lock_after_release() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.lock(&h("aa")).await;
        let l2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = l2.lock(&h("aa")).await;
            true
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        assert!(waiter.await.unwrap());
    }
}
