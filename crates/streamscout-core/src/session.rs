//! Per-extraction session state

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::types::{EmbedTarget, StrategyKind, StreamCandidate};

/// Shared, append-only candidate buffer
///
/// Strategies push into it as they discover URLs, so whatever was found
/// before a timeout survives the strategy future being dropped.
#[derive(Clone, Default)]
pub struct CandidateSink {
    inner: Arc<SinkInner>,
}

#[derive(Default)]
struct SinkInner {
    candidates: Mutex<Vec<StreamCandidate>>,
    pushed: Notify,
}

impl CandidateSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StreamCandidate>> {
        self.inner
            .candidates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, candidate: StreamCandidate) {
        self.lock().push(candidate);
        self.inner.pushed.notify_waiters();
    }

    pub fn extend(&self, candidates: impl IntoIterator<Item = StreamCandidate>) {
        let mut guard = self.lock();
        let before = guard.len();
        guard.extend(candidates);
        let grew = guard.len() > before;
        drop(guard);

        if grew {
            self.inner.pushed.notify_waiters();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the buffer, returning everything pushed so far
    pub fn take(&self) -> Vec<StreamCandidate> {
        std::mem::take(&mut *self.lock())
    }

    /// Resolves as soon as the buffer holds at least one candidate
    pub async fn wait_non_empty(&self) {
        loop {
            let pushed = self.inner.pushed.notified();
            tokio::pin!(pushed);
            // Register before checking so a push in between is not missed
            pushed.as_mut().enable();
            if !self.is_empty() {
                return;
            }
            pushed.await;
        }
    }
}

impl std::fmt::Debug for CandidateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateSink")
            .field("len", &self.len())
            .finish()
    }
}

/// Where an extraction currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Running(StrategyKind),
    /// The strategy overran its budget; the cascade moves on from here
    TimedOut(StrategyKind),
    Succeeded,
    Exhausted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Exhausted)
    }

    fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Pending | Running(_) | TimedOut(_), Running(_)) => true,
            (Running(current), TimedOut(timed_out)) => current == timed_out,
            (Pending | Running(_) | TimedOut(_), Succeeded | Exhausted) => true,
            _ => false,
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// State owned by a single `extract` call
#[derive(Debug)]
pub struct ExtractionSession {
    pub target: EmbedTarget,
    /// Everything found, in discovery order
    pub discovered: Vec<StreamCandidate>,
    pub attempted: BTreeSet<StrategyKind>,
    pub deadline: Instant,
    state: SessionState,
}

impl ExtractionSession {
    pub fn new(target: EmbedTarget, deadline: Instant) -> Self {
        Self {
            target,
            discovered: Vec::new(),
            attempted: BTreeSet::new(),
            deadline,
            state: SessionState::Pending,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next`, refusing transitions out of terminal states and
    /// time-outs of a strategy that is not running
    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_advance_to(&next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if let SessionState::Running(kind) = next {
            self.attempted.insert(kind);
        }
        self.state = next;
        Ok(())
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
