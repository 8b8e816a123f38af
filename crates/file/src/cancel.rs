//! Live cancellation tokens of one file handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    tokens: HashMap<u64, CancellationToken>,
}

/// Set of tokens for the operations a handle currently has in flight.
///
/// Each operation holds a [`CancelGuard`] for its whole lifetime; dropping the
/// guard takes the token back out, whichever way the operation ended.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for an operation that is starting now.
    pub fn register(&self) -> CancelGuard {
        let token = CancellationToken::new();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.tokens.insert(id, token.clone());

        CancelGuard {
            id,
            token,
            registry: self.inner.clone(),
        }
    }

    /// Cancel every live operation and forget their tokens.
    ///
    /// Does not wait for the operations to observe it. Returns how many
    /// tokens were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.tokens.drain().map(|(_, token)| token).collect()
        };
        for token in &drained {
            token.cancel();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "cancelled pending operations");
        }
        drained.len()
    }

    /// Number of operations currently registered.
    pub fn live(&self) -> usize {
        self.inner.lock().tokens.len()
    }
}

pub struct CancelGuard {
    id: u64,
    token: CancellationToken,
    registry: Arc<Mutex<Inner>>,
}

impl CancelGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.registry.lock().tokens.remove(&self.id);
    }
}

impl std::fmt::Debug for CancelGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelGuard")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_removes_itself() {
        let registry = CancellationRegistry::new();
        let first = registry.register();
        let second = registry.register();
        assert_eq!(registry.live(), 2);

        drop(first);
        assert_eq!(registry.live(), 1);
        drop(second);
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let registry = CancellationRegistry::new();
        let guard = registry.register();
        let token = guard.token().clone();

        assert_eq!(registry.cancel_all(), 1);
        assert!(guard.is_cancelled());
        assert!(token.is_cancelled());
        assert_eq!(registry.live(), 0);

        // the guard of a cancelled operation still drops cleanly
        drop(guard);
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn test_cancel_with_nothing_live() {
        let registry = CancellationRegistry::new();
        assert_eq!(registry.cancel_all(), 0);

        // later registrations are unaffected by an earlier cancel
        let guard = registry.register();
        assert!(!guard.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_wakes() {
        let registry = CancellationRegistry::new();
        let guard = registry.register();
        let token = guard.token().clone();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        registry.cancel_all();
        waiter.await.unwrap();
    }
}
