//! Per-scope mutual exclusion inside one process.
//!
//! Calls for the same `(tenant, org, period)` wait their turn; calls for
//! different scopes never touch each other's lock. Entries are dropped as
//! soon as nobody holds or waits for them, so the map tracks only live
//! contention.

use std::sync::Arc;

use dashmap::DashMap;
use invoice_numbering_core::ScopeKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<ScopeKey, Arc<Mutex<()>>>;

/// Registry of per-scope async locks.
#[derive(Debug, Clone, Default)]
pub struct ScopeLocks {
    inner: Arc<LockMap>,
}

impl ScopeLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `scope`.
    pub async fn acquire(&self, scope: ScopeKey) -> ScopeGuard {
        let mutex = Arc::clone(&self.inner.entry(scope).or_default());
        let guard = mutex.lock_owned().await;
        ScopeGuard {
            locks: Arc::clone(&self.inner),
            scope,
            guard: Some(guard),
        }
    }

    /// Number of scopes currently held or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no scope is held or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Exclusive access to one scope, released on drop.
#[derive(Debug)]
pub struct ScopeGuard {
    locks: Arc<LockMap>,
    scope: ScopeKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ScopeGuard {
    /// The scope this guard holds.
    #[must_use]
    pub const fn scope(&self) -> &ScopeKey {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        // Release first so the map entry is the last reference when idle.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.scope, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoice_numbering_core::{OrganizationId, Period, TenantId};
    use std::time::Duration;

    fn scope(org: u64) -> ScopeKey {
        ScopeKey::new(
            TenantId::new(1),
            OrganizationId::new(org),
            Period::new(2025, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn same_scope_waits() {
        let locks = ScopeLocks::new();
        let held = locks.acquire(scope(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(scope(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        let second = tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.scope(), &scope(1));
    }

    #[tokio::test]
    async fn different_scopes_do_not_block() {
        let locks = ScopeLocks::new();
        let _a = locks.acquire(scope(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(scope(2))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn idle_entries_are_removed() {
        let locks = ScopeLocks::new();
        {
            let _guard = locks.acquire(scope(1)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
