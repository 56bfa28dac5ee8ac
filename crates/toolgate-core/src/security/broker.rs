//! Approval broker for requests that need a human decision.
//!
//! Every call that cannot be decided by policy becomes a `PendingRequest`
//! tracked here, and its `UserRequest` is delivered through a bounded queue to
//! whatever renders prompts. The caller waits on a one-shot decision until the
//! human allows or denies it, or the broker is closed.
//!
//! ```text
//! caller ──► request_approval ──► pending set ──► queue ──► consumer
//!                  ▲                                           │
//!                  └────────── oneshot decision ◄── allow / disallow
//!                                                  (or close)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use toolgate_traits::{AuthError, Result};
use uuid::Uuid;

/// Default capacity of the request queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Outcome of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny,
    Closed,
}

/// Per-call bookkeeping with a one-shot guard: only the first resolution is
/// observed.
struct PendingRequest {
    responder: Mutex<Option<oneshot::Sender<AuthDecision>>>,
}

impl PendingRequest {
    fn new() -> (Arc<Self>, oneshot::Receiver<AuthDecision>) {
        let (tx, rx) = oneshot::channel();
        let pending = Arc::new(Self {
            responder: Mutex::new(Some(tx)),
        });
        (pending, rx)
    }

    /// Returns false if the request was already resolved.
    fn resolve(&self, decision: AuthDecision) -> bool {
        let Some(tx) = self.responder.lock().take() else {
            return false;
        };
        // The caller may have gone away; the decision is still final.
        let _ = tx.send(decision);
        true
    }
}

/// A request for a human decision, delivered to the consumer of the queue.
///
/// Exactly one decision is recorded per request. Dropping a request without
/// answering it denies it.
pub struct UserRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    pub prompt: String,
    pub argv: Vec<String>,
    pending: Option<Arc<PendingRequest>>,
}

impl UserRequest {
    /// Approve the request.
    pub fn allow(mut self) {
        self.respond(AuthDecision::Allow);
    }

    /// Deny the request.
    pub fn disallow(mut self) {
        self.respond(AuthDecision::Deny);
    }

    fn respond(&mut self, decision: AuthDecision) {
        if let Some(pending) = self.pending.take()
            && !pending.resolve(decision)
        {
            tracing::debug!(
                tool_call_id = %self.tool_call_id,
                ?decision,
                "Ignoring decision for an already resolved request"
            );
        }
    }
}

impl Drop for UserRequest {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take()
            && pending.resolve(AuthDecision::Deny)
        {
            tracing::warn!(
                tool_call_id = %self.tool_call_id,
                tool = %self.tool_name,
                "Approval request dropped without an answer; denying"
            );
        }
    }
}

impl fmt::Debug for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRequest")
            .field("tool_call_id", &self.tool_call_id)
            .field("tool_name", &self.tool_name)
            .field("prompt", &self.prompt)
            .field("argv", &self.argv)
            .finish_non_exhaustive()
    }
}

struct BrokerState {
    closed: bool,
    sender: Option<mpsc::Sender<UserRequest>>,
    pending: HashMap<String, Arc<PendingRequest>>,
}

/// Serializes delivery of approval requests and guarantees that shutdown
/// never leaves a caller blocked.
///
/// The queue, the pending set and the closed flag share one mutex. Each
/// in-flight enqueue holds its own clone of the queue sender and is counted
/// in `pending_enqueues`, so the queue only closes once `close` has dropped
/// the broker's sender and every in-flight enqueue has lost its race against
/// shutdown or finished.
pub struct ApprovalBroker {
    state: Mutex<BrokerState>,
    shutdown: CancellationToken,
    enqueues: AtomicUsize,
}

impl ApprovalBroker {
    /// Create a broker and the receiving end of its request queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<UserRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let broker = Self {
            state: Mutex::new(BrokerState {
                closed: false,
                sender: Some(tx),
                pending: HashMap::new(),
            }),
            shutdown: CancellationToken::new(),
            enqueues: AtomicUsize::new(0),
        };
        (broker, rx)
    }

    /// Queue a request and wait until it is resolved.
    ///
    /// Returns `Ok(())` when allowed, `AuthorizationDenied` when denied and
    /// `AuthorizerClosed` when the broker is (or becomes) closed.
    pub async fn request_approval(
        &self,
        prompt: String,
        tool_name: &str,
        argv: &[String],
    ) -> Result<()> {
        let tool_call_id = Uuid::new_v4().to_string();
        let (pending, decision_rx) = PendingRequest::new();

        let sender = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(AuthError::AuthorizerClosed);
            }
            let Some(sender) = state.sender.clone() else {
                return Err(AuthError::AuthorizerClosed);
            };
            state
                .pending
                .insert(tool_call_id.clone(), Arc::clone(&pending));
            sender
        };

        // The entry must leave the pending set however this call ends,
        // including when the caller's future is dropped mid-wait.
        let _forget = scopeguard::guard(tool_call_id.clone(), |id| {
            self.state.lock().pending.remove(&id);
        });

        let enqueued = {
            self.enqueues.fetch_add(1, Ordering::SeqCst);
            let _in_flight = scopeguard::guard((), |()| {
                self.enqueues.fetch_sub(1, Ordering::SeqCst);
            });
            let permit = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => None,
                permit = sender.reserve() => permit.ok(),
            };
            match permit {
                Some(permit) => {
                    permit.send(UserRequest {
                        tool_call_id: tool_call_id.clone(),
                        tool_name: tool_name.to_string(),
                        prompt,
                        argv: argv.to_vec(),
                        pending: Some(pending),
                    });
                    true
                }
                None => {
                    pending.resolve(AuthDecision::Closed);
                    false
                }
            }
        };
        drop(sender);
        if !enqueued {
            return Err(AuthError::AuthorizerClosed);
        }

        tracing::info!(%tool_call_id, tool = tool_name, "Waiting for user approval");

        let decision = decision_rx.await.unwrap_or(AuthDecision::Closed);
        tracing::info!(%tool_call_id, ?decision, "Approval request resolved");

        match decision {
            AuthDecision::Allow => Ok(()),
            AuthDecision::Deny => Err(AuthError::AuthorizationDenied),
            AuthDecision::Closed => Err(AuthError::AuthorizerClosed),
        }
    }

    /// Close the broker. Idempotent.
    ///
    /// Marks the broker closed, captures and clears the pending set, signals
    /// shutdown to in-flight enqueues, releases the queue and resolves every
    /// captured request as closed.
    pub fn close(&self) {
        let (pending, sender) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            (std::mem::take(&mut state.pending), state.sender.take())
        };

        self.shutdown.cancel();
        drop(sender);

        let outstanding = pending.len();
        for request in pending.into_values() {
            request.resolve(AuthDecision::Closed);
        }
        tracing::info!(outstanding, "Approval broker closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of requests waiting for a decision.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of callers still racing to put a request on the queue.
    pub fn pending_enqueues(&self) -> usize {
        self.enqueues.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ApprovalBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ApprovalBroker")
            .field("closed", &state.closed)
            .field("pending", &state.pending.len())
            .field("enqueues", &self.pending_enqueues())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_allow_resolves_ok() {
        let (broker, mut rx) = ApprovalBroker::new(DEFAULT_QUEUE_CAPACITY);
        let broker = Arc::new(broker);

        let caller = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .request_approval("run git push".to_string(), "shell", &argv(&["git", "push"]))
                    .await
            })
        };

        let request = rx.recv().await.unwrap();
        assert_eq!(request.tool_name, "shell");
        assert_eq!(request.argv, argv(&["git", "push"]));
        assert_eq!(request.prompt, "run git push");
        request.allow();

        assert_eq!(caller.await.unwrap(), Ok(()));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_disallow_resolves_denied() {
        let (broker, mut rx) = ApprovalBroker::new(1);
        let broker = Arc::new(broker);

        let caller = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .request_approval("write".to_string(), "write_file", &[])
                    .await
            })
        };

        rx.recv().await.unwrap().disallow();
        assert_eq!(caller.await.unwrap(), Err(AuthError::AuthorizationDenied));
    }

    #[tokio::test]
    async fn test_dropped_request_denies() {
        let (broker, mut rx) = ApprovalBroker::new(1);
        let broker = Arc::new(broker);

        let caller = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.request_approval("x".to_string(), "ls", &[]).await })
        };

        drop(rx.recv().await.unwrap());
        assert_eq!(caller.await.unwrap(), Err(AuthError::AuthorizationDenied));
    }

    #[tokio::test]
    async fn test_request_after_close_fails_immediately() {
        let (broker, _rx) = ApprovalBroker::new(1);
        broker.close();
        let result = timeout(
            Duration::from_secs(1),
            broker.request_approval("x".to_string(), "ls", &[]),
        )
        .await
        .expect("closed broker must not block");
        assert_eq!(result, Err(AuthError::AuthorizerClosed));
    }

    #[tokio::test]
    async fn test_close_resolves_outstanding_requests() {
        let (broker, mut rx) = ApprovalBroker::new(4);
        let broker = Arc::new(broker);

        let caller = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.request_approval("x".to_string(), "ls", &[]).await })
        };

        let request = rx.recv().await.unwrap();
        assert_eq!(broker.pending_count(), 1);
        broker.close();
        assert_eq!(caller.await.unwrap(), Err(AuthError::AuthorizerClosed));

        // A late answer is ignored.
        request.allow();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_unblocks_enqueue_on_full_queue() {
        let (broker, mut rx) = ApprovalBroker::new(1);
        let broker = Arc::new(broker);

        let mut callers = Vec::new();
        for _ in 0..3 {
            let broker = broker.clone();
            callers.push(tokio::spawn(async move {
                broker.request_approval("x".to_string(), "ls", &[]).await
            }));
        }

        // Nobody drains the queue; only one request fits.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.pending_enqueues(), 2);
        broker.close();

        for caller in callers {
            let result = timeout(Duration::from_secs(1), caller)
                .await
                .expect("close must unblock every caller")
                .unwrap();
            assert_eq!(result, Err(AuthError::AuthorizerClosed));
        }

        assert_eq!(broker.pending_enqueues(), 0);

        let mut delivered = 0;
        while rx.recv().await.is_some() {
            delivered += 1;
        }
        assert!(delivered <= 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_reports_closed() {
        let (broker, rx) = ApprovalBroker::new(1);
        drop(rx);
        let result = broker.request_approval("x".to_string(), "ls", &[]).await;
        assert_eq!(result, Err(AuthError::AuthorizerClosed));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (broker, mut rx) = ApprovalBroker::new(1);
        broker.close();
        broker.close();
        assert!(broker.is_closed());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_caller_leaves_no_pending_entry() {
        let (broker, mut rx) = ApprovalBroker::new(1);
        let broker = Arc::new(broker);

        let caller = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.request_approval("x".to_string(), "ls", &[]).await })
        };
        let request = rx.recv().await.unwrap();
        assert_eq!(broker.pending_count(), 1);

        caller.abort();
        let _ = caller.await;
        assert_eq!(broker.pending_count(), 0);
        request.allow();
    }
}
