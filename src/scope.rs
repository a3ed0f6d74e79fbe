//! Lifetimes for in-flight fetches.
//!
//! Each view owns a `ViewScope`. Work spawned through the scope is abandoned
//! when the view closes, and whatever it would have produced is tagged with
//! the scope id so a result that races the close can still be recognized as
//! stale by the receiver.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

/// A result produced inside a scope.
#[derive(Debug)]
pub struct Scoped<M> {
    pub scope: ScopeId,
    pub message: M,
}

#[derive(Debug)]
pub struct ViewScope {
    id: ScopeId,
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self {
            id: ScopeId(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed)),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(scope = self.id.0, "cancelling view scope");
            self.token.cancel();
        }
    }

    /// Spawn `fut` and deliver its output on `tx`, unless the scope is
    /// cancelled first.
    pub fn spawn<F, M>(&self, tx: &UnboundedSender<Scoped<M>>, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = M> + Send + 'static,
        M: Send + 'static,
    {
        let token = self.token.clone();
        let scope = self.id;
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(message) = guarded(token, fut).await {
                // The receiver is gone only when the UI is shutting down.
                let _ = tx.send(Scoped { scope, message });
            }
        })
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn guarded<F: Future>(token: CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = fut => (!token.is_cancelled()).then_some(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_completed_work_is_delivered_with_scope_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scope = ViewScope::new();
        scope.spawn(&tx, async { 42 }).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.scope, scope.id());
        assert_eq!(received.message, 42);
    }

    #[tokio::test]
    async fn test_cancelled_scope_drops_result() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Scoped<u32>>();
        let scope = ViewScope::new();
        let handle = scope.spawn(&tx, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            7
        });
        scope.cancel();
        handle.await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_scope_cancels_work() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Scoped<u32>>();
        let handle = {
            let scope = ViewScope::new();
            scope.spawn(&tx, async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                7
            })
        };
        handle.await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scope = ViewScope::new();
        scope.cancel();
        scope.cancel();
        assert!(scope.is_cancelled());
        scope.spawn(&tx, async { 1 }).await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_scope_ids_are_unique() {
        let a = ViewScope::new();
        let b = ViewScope::new();
        assert_ne!(a.id(), b.id());
    }
}
