//! Per-manager completion gate.
//!
//! Each network round-trip a caller may wait on is bracketed by `enter` and
//! `leave`. Waiters resolve once every entered round-trip has left and at
//! least one outcome has been published.

use tokio::sync::watch;

use super::error::AuthError;
use super::token::TokenPair;

/// Result published through the gate.
pub type GateOutcome = Result<TokenPair, AuthError>;

#[derive(Debug, Clone, Default)]
struct GateState {
    pending: usize,
    outcome: Option<GateOutcome>,
}

impl GateState {
    fn settled(&self) -> Option<GateOutcome> {
        if self.pending == 0 {
            self.outcome.clone()
        } else {
            None
        }
    }
}

/// Counting completion signal that carries the last outcome.
#[derive(Debug)]
pub struct CompletionGate {
    state: watch::Sender<GateState>,
}

impl CompletionGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::default());
        Self { state }
    }

    pub fn enter(&self) {
        self.state.send_modify(|state| state.pending += 1);
    }

    /// Leave once and publish `outcome`.
    ///
    /// A `leave` without a matching `enter` still publishes the outcome.
    pub fn leave(&self, outcome: GateOutcome) {
        self.state.send_modify(|state| {
            state.pending = state.pending.saturating_sub(1);
            state.outcome = Some(outcome);
        });
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    /// Last settled outcome without waiting.
    pub fn outcome(&self) -> Option<GateOutcome> {
        self.state.borrow().settled()
    }

    /// Wait until the gate is balanced and an outcome exists.
    pub async fn wait(&self) -> GateOutcome {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let outcome = match rx.wait_for(|state| state.settled().is_some()).await {
            Ok(state) => state.settled(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(AuthError::MissingAccessToken))
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn pair(access: &str) -> TokenPair {
        TokenPair::issued(access, "R1", "Bearer", 3600)
    }

    #[tokio::test]
    async fn wait_resolves_after_leave() {
        let gate = Arc::new(CompletionGate::new());
        gate.enter();
        assert!(gate.outcome().is_none());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.leave(Ok(pair("A1")));
        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome.access_token, "A1");
        assert_eq!(gate.pending(), 0);
    }

    #[tokio::test]
    async fn wait_blocks_until_all_entries_leave() {
        let gate = Arc::new(CompletionGate::new());
        gate.enter();
        gate.enter();
        gate.leave(Ok(pair("A1")));
        assert!(gate.outcome().is_none());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        gate.leave(Ok(pair("A2")));
        assert_eq!(waiter.await.unwrap().unwrap().access_token, "A2");
    }

    #[tokio::test]
    async fn failures_are_delivered_to_waiters() {
        let gate = CompletionGate::new();
        gate.enter();
        gate.leave(Err(AuthError::InvalidAuthorizationCode));
        assert_eq!(gate.wait().await, Err(AuthError::InvalidAuthorizationCode));
    }

    #[test]
    fn unmatched_leave_does_not_underflow() {
        let gate = CompletionGate::new();
        gate.leave(Ok(pair("A1")));
        assert_eq!(gate.pending(), 0);
        assert!(gate.outcome().is_some());
    }
}
