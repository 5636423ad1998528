//! Embedding lifecycle: when to (re)compute, and at most one computation
//! per content checksum at a time
//!
//! ```text
//! Missing ──begin──▶ Pending ──complete(Ok)──▶ Fresh
//! Stale   ──begin──▶ Pending ──complete(Err)─▶ Missing / Stale (no retry)
//! ```
//!
//! The coordinator never computes or stores embeddings. It hands out a
//! ticket: the first caller for a checksum gets `Dispatch` and must run the
//! computation; callers arriving while it is in flight get `Join` and wait
//! for the same outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

const ABANDONED: &str = "computation abandoned before completion";

/// Freshness of one item's embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    /// No vector on record
    Missing,
    /// Vector present and computed from the current content
    Fresh,
    /// Vector present but the content changed since
    Stale,
    /// A computation for the current content is in flight
    Pending,
}

impl EmbeddingStatus {
    pub fn needs_computation(&self) -> bool {
        matches!(self, Self::Missing | Self::Stale)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare the current content checksum with the one recorded for the vector
pub fn check_embedding_status(
    item_checksum: &str,
    recorded_checksum: Option<&str>,
    has_vector: bool,
) -> EmbeddingStatus {
    if !has_vector {
        EmbeddingStatus::Missing
    } else if recorded_checksum == Some(item_checksum) {
        EmbeddingStatus::Fresh
    } else {
        EmbeddingStatus::Stale
    }
}

/// Result of one computation, shared with every joiner
#[derive(Debug, Clone, PartialEq)]
pub enum ComputationOutcome {
    Ready(Arc<Vec<f32>>),
    Failed(String),
}

impl ComputationOutcome {
    pub fn into_result(self) -> Result<Arc<Vec<f32>>, String> {
        match self {
            Self::Ready(vector) => Ok(vector),
            Self::Failed(reason) => Err(reason),
        }
    }
}

type Slot = watch::Receiver<Option<ComputationOutcome>>;
type InFlight = Arc<Mutex<HashMap<String, Slot>>>;

/// Tracks in-flight computations by content checksum
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCoordinator {
    in_flight: InFlight,
}

impl EmbeddingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to compute the embedding for `checksum`
    ///
    /// The lookup and the insert happen under one lock, so two racing
    /// callers can never both receive `Dispatch`.
    pub fn begin(&self, checksum: &str) -> ComputationTicket {
        let mut in_flight = lock(&self.in_flight);

        if let Some(slot) = in_flight.get(checksum) {
            return ComputationTicket::Join(Attachment {
                checksum: checksum.to_string(),
                receiver: slot.clone(),
            });
        }

        let (sender, receiver) = watch::channel(None);
        in_flight.insert(checksum.to_string(), receiver);

        ComputationTicket::Dispatch(DispatchGuard {
            checksum: checksum.to_string(),
            sender: Some(sender),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_pending(&self, checksum: &str) -> bool {
        lock(&self.in_flight).contains_key(checksum)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// `check_embedding_status`, reporting `Pending` for in-flight content
    pub fn status(
        &self,
        item_checksum: &str,
        recorded_checksum: Option<&str>,
        has_vector: bool,
    ) -> EmbeddingStatus {
        let status = check_embedding_status(item_checksum, recorded_checksum, has_vector);
        if status.needs_computation() && self.is_pending(item_checksum) {
            EmbeddingStatus::Pending
        } else {
            status
        }
    }
}

// A poisoned lock still holds a consistent map: every mutation is a single
// insert or remove.
fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, Slot>> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The flags form of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeginDecision {
    pub dispatch: bool,
    pub join_existing: bool,
}

/// What `begin` hands back
#[derive(Debug)]
pub enum ComputationTicket {
    /// Caller owns the computation and must `complete` it
    Dispatch(DispatchGuard),
    /// Another caller is computing the same content
    Join(Attachment),
}

impl ComputationTicket {
    pub fn dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    pub fn join_existing(&self) -> bool {
        matches!(self, Self::Join(_))
    }

    pub fn decision(&self) -> BeginDecision {
        BeginDecision {
            dispatch: self.dispatch(),
            join_existing: self.join_existing(),
        }
    }

    pub fn checksum(&self) -> &str {
        match self {
            Self::Dispatch(guard) => &guard.checksum,
            Self::Join(attachment) => &attachment.checksum,
        }
    }
}

/// Ownership of one in-flight computation
///
/// Dropping the guard without `complete` counts as a failure: joiners are
/// released and the checksum leaves the in-flight set.
#[derive(Debug)]
pub struct DispatchGuard {
    checksum: String,
    sender: Option<watch::Sender<Option<ComputationOutcome>>>,
    in_flight: InFlight,
}

impl DispatchGuard {
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Publish the outcome to joiners and clear the in-flight entry
    pub fn complete(mut self, result: Result<Vec<f32>, String>) -> ComputationOutcome {
        let outcome = match result {
            Ok(vector) => ComputationOutcome::Ready(Arc::new(vector)),
            Err(reason) => ComputationOutcome::Failed(reason),
        };
        self.finish(outcome.clone());
        outcome
    }

    fn finish(&mut self, outcome: ComputationOutcome) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        let mut in_flight = lock(&self.in_flight);
        in_flight.remove(&self.checksum);
        // Joiners hold their own receivers; none left is fine.
        let _ = sender.send(Some(outcome));
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.finish(ComputationOutcome::Failed(ABANDONED.to_string()));
    }
}

/// A wait on someone else's computation
#[derive(Debug)]
pub struct Attachment {
    checksum: String,
    receiver: Slot,
}

impl Attachment {
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub async fn wait(mut self) -> ComputationOutcome {
        let outcome = match self.receiver.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| ComputationOutcome::Failed(ABANDONED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_status_from_checksums() {
        assert_eq!(check_embedding_status("abc", None, false), EmbeddingStatus::Missing);
        assert_eq!(check_embedding_status("abc", Some("abc"), false), EmbeddingStatus::Missing);
        assert_eq!(check_embedding_status("abc", Some("abc"), true), EmbeddingStatus::Fresh);
        assert_eq!(check_embedding_status("abc", Some("old"), true), EmbeddingStatus::Stale);
        assert_eq!(check_embedding_status("abc", None, true), EmbeddingStatus::Stale);
    }

    #[test]
    fn test_second_begin_joins() {
        let coordinator = EmbeddingCoordinator::new();

        let first = coordinator.begin("sum-1");
        let second = coordinator.begin("sum-1");
        assert_eq!(
            first.decision(),
            BeginDecision {
                dispatch: true,
                join_existing: false
            }
        );
        assert_eq!(
            second.decision(),
            BeginDecision {
                dispatch: false,
                join_existing: true
            }
        );

        // different content is independent
        assert!(coordinator.begin("sum-2").dispatch());
    }

    #[test]
    fn test_concurrent_begin_dispatches_once() {
        let coordinator = EmbeddingCoordinator::new();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.begin("same-content")
                })
            })
            .collect();

        let tickets: Vec<ComputationTicket> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(tickets.iter().filter(|t| t.dispatch()).count(), 1);
        assert_eq!(tickets.iter().filter(|t| t.join_existing()).count(), 1);
    }

    #[test]
    fn test_many_threads_single_dispatch() {
        let coordinator = EmbeddingCoordinator::new();
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.begin("batch-text")
                })
            })
            .collect();

        let tickets: Vec<ComputationTicket> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(tickets.iter().filter(|t| t.dispatch()).count(), 1);
        assert_eq!(coordinator.in_flight_count(), 1);
    }

    #[test]
    fn test_completion_clears_in_flight() {
        let coordinator = EmbeddingCoordinator::new();

        let ComputationTicket::Dispatch(guard) = coordinator.begin("c1") else {
            panic!("expected dispatch");
        };
        assert!(coordinator.is_pending("c1"));
        assert_eq!(coordinator.status("c1", None, false), EmbeddingStatus::Pending);

        guard.complete(Ok(vec![1.0, 0.0]));
        assert!(!coordinator.is_pending("c1"));
        assert!(coordinator.begin("c1").dispatch());
    }

    #[test]
    fn test_failure_clears_in_flight_without_retry() {
        let coordinator = EmbeddingCoordinator::new();

        let ComputationTicket::Dispatch(guard) = coordinator.begin("c1") else {
            panic!("expected dispatch");
        };
        let outcome = guard.complete(Err("provider timeout".to_string()));
        assert_eq!(outcome, ComputationOutcome::Failed("provider timeout".to_string()));
        assert_eq!(coordinator.in_flight_count(), 0);
        // back to what the store says
        assert_eq!(coordinator.status("c1", Some("c0"), true), EmbeddingStatus::Stale);
        assert_eq!(coordinator.status("c1", None, false), EmbeddingStatus::Missing);
    }

    #[test]
    fn test_fresh_is_never_pending() {
        let coordinator = EmbeddingCoordinator::new();
        let _ticket = coordinator.begin("c1");
        assert_eq!(coordinator.status("c1", Some("c1"), true), EmbeddingStatus::Fresh);
    }

    #[test]
    fn test_dropped_guard_is_a_failure() {
        let coordinator = EmbeddingCoordinator::new();
        let first = coordinator.begin("c1");
        let ComputationTicket::Join(attachment) = coordinator.begin("c1") else {
            panic!("expected join");
        };
        drop(first);
        assert_eq!(coordinator.in_flight_count(), 0);

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let outcome = runtime.block_on(attachment.wait());
        assert!(matches!(outcome, ComputationOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_joiner_receives_dispatched_result() {
        let coordinator = EmbeddingCoordinator::new();

        let ComputationTicket::Dispatch(guard) = coordinator.begin("c1") else {
            panic!("expected dispatch");
        };
        let ComputationTicket::Join(attachment) = coordinator.begin("c1") else {
            panic!("expected join");
        };

        let waiter = tokio::spawn(attachment.wait());
        guard.complete(Ok(vec![0.6, 0.8]));

        let outcome = waiter.await.unwrap();
        assert_eq!(outcome.into_result().unwrap().as_slice(), &[0.6, 0.8]);
    }

    #[tokio::test]
    async fn test_join_after_completion_sees_value() {
        let coordinator = EmbeddingCoordinator::new();

        let ComputationTicket::Dispatch(guard) = coordinator.begin("c1") else {
            panic!("expected dispatch");
        };
        let ComputationTicket::Join(attachment) = coordinator.begin("c1") else {
            panic!("expected join");
        };
        guard.complete(Err("boom".to_string()));

        assert_eq!(
            attachment.wait().await,
            ComputationOutcome::Failed("boom".to_string())
        );
    }
}
