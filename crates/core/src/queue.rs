//! Serialization of renegotiating operations.
//!
//! Every operation that touches a handler's remote SDP runs while holding
//! its transport's queue turn. Turns are handed out in submission order
//! (tokio's mutex is fair), so operations complete strictly in the order
//! they were submitted.
//!
//! ```text
//!   run(Produce(video)) ──┐
//!   run(Produce(video)) ──┼─ DropDuplicates: second returns Coalesced
//!   run(StopSending(1)) ──┘
//!
//!   drain() ─► queued-but-not-started operations fail with QueueDrained
//! ```

use std::collections::HashSet;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Result, SfuError, StateErrorKind};
use crate::ortc::MediaKind;

/// What a queue does with a request whose key is already pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescePolicy {
    /// Answer the request with [`QueueOutcome::Coalesced`] without running it.
    DropDuplicates,
    /// Queue it like any other request.
    Enqueue,
}

/// Identity of a request for coalescing purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKey {
    Produce(MediaKind),
    StopSending(String),
    ChangeTrack(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome<T> {
    Completed(T),
    /// An equivalent request was already pending.
    Coalesced,
}

impl<T> QueueOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Coalesced => None,
        }
    }

    pub fn is_coalesced(&self) -> bool {
        matches!(self, Self::Coalesced)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: HashSet<OperationKey>,
    /// Bumped by `drain`; operations queued under an older generation fail.
    generation: u64,
    outstanding: usize,
}

pub struct OperationQueue {
    name: &'static str,
    policy: CoalescePolicy,
    turn: tokio::sync::Mutex<()>,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl OperationQueue {
    pub fn new(name: &'static str, policy: CoalescePolicy) -> Self {
        Self {
            name,
            policy,
            turn: tokio::sync::Mutex::new(()),
            state: Mutex::new(QueueState::default()),
            idle: Notify::new(),
        }
    }

    pub fn policy(&self) -> CoalescePolicy {
        self.policy
    }

    /// Operations submitted and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Run `op` once every earlier operation has finished.
    pub async fn run<T, F, Fut>(&self, key: Option<OperationKey>, op: F) -> Result<QueueOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(ticket) = self.admit(key) else {
            return Ok(QueueOutcome::Coalesced);
        };
        self.execute(ticket, op).await.map(QueueOutcome::Completed)
    }

    /// Like [`run`](Self::run) for requests that are never coalesced.
    pub async fn run_exclusive<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ticket = self.enter(None);
        self.execute(ticket, op).await
    }

    /// Register a request, or `None` when its key is already pending.
    fn admit(&self, key: Option<OperationKey>) -> Option<Ticket<'_>> {
        let key = key.filter(|_| self.policy == CoalescePolicy::DropDuplicates);
        if let Some(key) = &key {
            let mut state = self.state.lock();
            if !state.pending.insert(key.clone()) {
                tracing::warn!(queue = self.name, ?key, "duplicate request dropped");
                return None;
            }
        }
        Some(self.enter(key))
    }

    fn enter(&self, key: Option<OperationKey>) -> Ticket<'_> {
        let mut state = self.state.lock();
        state.outstanding += 1;
        Ticket {
            queue: self,
            key,
            generation: state.generation,
        }
    }

    async fn execute<T, F, Fut>(&self, ticket: Ticket<'_>, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _turn = self.turn.lock().await;
        if self.state.lock().generation != ticket.generation {
            tracing::debug!(queue = self.name, "queued operation rejected after drain");
            return Err(SfuError::State(StateErrorKind::QueueDrained));
        }
        let result = op().await;
        drop(ticket);
        result
    }

    /// Reject everything queued but not started. The running operation, if
    /// any, is not waited for.
    pub fn drain(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.pending.clear();
        tracing::debug!(queue = self.name, outstanding = state.outstanding, "queue drained");
    }

    /// Resolve once no operation is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.state.lock().outstanding == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Bookkeeping released when an operation finishes, fails or is dropped.
struct Ticket<'a> {
    queue: &'a OperationQueue,
    key: Option<OperationKey>,
    generation: u64,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.state.lock();
        if let Some(key) = &self.key
            && state.generation == self.generation
        {
            state.pending.remove(key);
        }
        state.outstanding -= 1;
        if state.outstanding == 0 {
            self.queue.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn runs_in_submission_order() {
        let queue = OperationQueue::new("test", CoalescePolicy::Enqueue);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let step = |n: u32| {
            let order = order.clone();
            let queue = &queue;
            async move {
                queue
                    .run(None, || async move {
                        tokio::task::yield_now().await;
                        order.lock().push(n);
                        Ok(n)
                    })
                    .await
            }
        };
        let (a, b, c) = tokio::join!(step(1), step(2), step(3));
        assert_eq!(a.unwrap(), QueueOutcome::Completed(1));
        assert_eq!(b.unwrap(), QueueOutcome::Completed(2));
        assert_eq!(c.unwrap(), QueueOutcome::Completed(3));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_key_is_coalesced() {
        let queue = OperationQueue::new("send", CoalescePolicy::DropDuplicates);
        let (tx, rx) = oneshot::channel::<()>();
        let key = || Some(OperationKey::Produce(MediaKind::Video));

        let first = queue.run(key(), || async move {
            rx.await.ok();
            Ok("first")
        });
        let second = async {
            let outcome = queue.run(key(), || async { Ok("second") }).await;
            tx.send(()).ok();
            outcome
        };
        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap(), QueueOutcome::Completed("first"));
        assert!(second.unwrap().is_coalesced());

        let third = queue.run(key(), || async { Ok("third") }).await.unwrap();
        assert_eq!(third.completed(), Some("third"), "key released after completion");
    }

    #[tokio::test]
    async fn enqueue_policy_never_coalesces() {
        let queue = OperationQueue::new("recv", CoalescePolicy::Enqueue);
        let key = || Some(OperationKey::Produce(MediaKind::Audio));
        let (a, b) = tokio::join!(
            queue.run(key(), || async { Ok(1) }),
            queue.run(key(), || async { Ok(2) })
        );
        assert_eq!(a.unwrap(), QueueOutcome::Completed(1));
        assert_eq!(b.unwrap(), QueueOutcome::Completed(2));
    }

    #[tokio::test]
    async fn drain_rejects_queued_operations() {
        let queue = OperationQueue::new("send", CoalescePolicy::DropDuplicates);
        let (tx, rx) = oneshot::channel::<()>();

        let running = queue.run(Some(OperationKey::Produce(MediaKind::Audio)), || async move {
            rx.await.ok();
            Ok(())
        });
        let queued = queue.run(Some(OperationKey::Produce(MediaKind::Video)), || async { Ok(()) });
        let control = async {
            tokio::task::yield_now().await;
            assert_eq!(queue.outstanding(), 2);
            queue.drain();
            tx.send(()).ok();
        };
        let (running, queued, ()) = tokio::join!(running, queued, control);
        assert!(running.is_ok(), "in-flight operation finishes");
        assert!(matches!(
            queued.unwrap_err(),
            SfuError::State(StateErrorKind::QueueDrained)
        ));
        assert_eq!(queue.outstanding(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_after_last_operation() {
        let queue = Arc::new(OperationQueue::new("recv", CoalescePolicy::Enqueue));
        queue.wait_idle().await;

        let (tx, rx) = oneshot::channel::<()>();
        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .run(None, || async move {
                        rx.await.ok();
                        Ok(())
                    })
                    .await
            })
        };
        while queue.outstanding() == 0 {
            tokio::task::yield_now().await;
        }
        tx.send(()).ok();
        queue.wait_idle().await;
        assert_eq!(queue.outstanding(), 0);
        assert!(worker.await.unwrap().is_ok());
    }
}
