use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::Result;
use crate::types::parse_target;

/// What the conversational layer asked the user for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    AwaitingBuyTarget,
    AwaitingSellTarget,
}

/// Resolved outcome of a pending dialog, ready to apply to the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DialogAction {
    SetBuyTarget(f64),
    SetSellTarget(f64),
}

struct Pending {
    state: DialogState,
    started: Instant,
}

/// Per-user conversation state, keyed by user id with a TTL. Replaces the
/// one-listener-per-message pattern: concurrent users each hold their own
/// entry, so two people answering at once can never cross-talk, and a crash
/// mid-dialog loses at most one pending input.
pub struct DialogTracker {
    pending: DashMap<i64, Pending>,
    ttl: Duration,
}

impl DialogTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    pub fn await_buy_target(&self, user_id: i64) {
        self.set(user_id, DialogState::AwaitingBuyTarget);
    }

    pub fn await_sell_target(&self, user_id: i64) {
        self.set(user_id, DialogState::AwaitingSellTarget);
    }

    fn set(&self, user_id: i64, state: DialogState) {
        self.pending.insert(
            user_id,
            Pending {
                state,
                started: Instant::now(),
            },
        );
    }

    pub fn cancel(&self, user_id: i64) {
        self.pending.remove(&user_id);
    }

    /// Feed a user's next text message into their pending dialog, if any.
    /// Returns `None` when the user has no live dialog (idle or expired).
    /// A malformed number comes back as a Validation error for the caller to
    /// relay to the user; the dialog stays open so they can try again.
    pub fn resolve(&self, user_id: i64, input: &str) -> Option<Result<DialogAction>> {
        let state = {
            let entry = self.pending.get(&user_id)?;
            if entry.started.elapsed() > self.ttl {
                drop(entry);
                self.pending.remove(&user_id);
                return None;
            }
            entry.state
        };

        match parse_target(input) {
            Ok(value) => {
                self.pending.remove(&user_id);
                Some(Ok(match state {
                    DialogState::AwaitingBuyTarget => DialogAction::SetBuyTarget(value),
                    DialogState::AwaitingSellTarget => DialogAction::SetSellTarget(value),
                }))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> DialogTracker {
        DialogTracker::new(Duration::from_secs(300))
    }

    #[test]
    fn idle_user_input_is_ignored() {
        let t = tracker();
        assert!(t.resolve(1, "10.60").is_none());
    }

    #[test]
    fn buy_target_resolves_and_closes_the_dialog() {
        let t = tracker();
        t.await_buy_target(1);
        let action = t.resolve(1, "10.60").unwrap().unwrap();
        assert_eq!(action, DialogAction::SetBuyTarget(10.60));
        // One-shot: a second message is idle input
        assert!(t.resolve(1, "11.00").is_none());
    }

    #[test]
    fn concurrent_users_never_cross_talk() {
        let t = tracker();
        t.await_buy_target(1);
        t.await_sell_target(2);

        let a = t.resolve(1, "10.60").unwrap().unwrap();
        let b = t.resolve(2, "10.20").unwrap().unwrap();
        assert_eq!(a, DialogAction::SetBuyTarget(10.60));
        assert_eq!(b, DialogAction::SetSellTarget(10.20));
    }

    #[test]
    fn invalid_number_keeps_the_dialog_open() {
        let t = tracker();
        t.await_sell_target(3);
        assert!(t.resolve(3, "not a price").unwrap().is_err());
        // Retry succeeds
        let action = t.resolve(3, "10.20").unwrap().unwrap();
        assert_eq!(action, DialogAction::SetSellTarget(10.20));
    }

    #[test]
    fn expired_dialog_behaves_as_idle() {
        let t = DialogTracker::new(Duration::from_millis(0));
        t.await_buy_target(4);
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.resolve(4, "10.60").is_none());
    }

    #[test]
    fn cancel_discards_pending_state() {
        let t = tracker();
        t.await_buy_target(5);
        t.cancel(5);
        assert!(t.resolve(5, "10.60").is_none());
    }
}
