//! Pending-confirmation map: dangerous actions parked behind a question.
//!
//! When the gate defers a shell action, the synthesized question's
//! `tool_call_id` keys the parked call here. The next turn's `role=tool`
//! answer with that id unlocks replay when it reads as "Proceed
//! (Recommended)". Entries are last-write-wins and evicted after a TTL.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::openai::ToolCallMsg;

/// Default time a parked action stays claimable.
pub const DEFAULT_CONFIRMATION_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct PendingAction {
    call: ToolCallMsg,
    parked_at: Instant,
}

/// Process-wide map of deferred dangerous actions keyed by question call id.
#[derive(Debug)]
pub struct PendingConfirmations {
    entries: DashMap<String, PendingAction>,
    ttl: Duration,
}

impl Default for PendingConfirmations {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_TTL)
    }
}

impl PendingConfirmations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Parks `call` under the question's id. Last write wins.
    pub fn park(&self, question_id: &str, call: ToolCallMsg) {
        self.evict_expired();
        self.entries.insert(
            question_id.to_string(),
            PendingAction {
                call,
                parked_at: Instant::now(),
            },
        );
    }

    /// Takes the parked call for `question_id` when `reply` confirms it.
    /// A rejected or unknown reply releases the slot without replay.
    pub fn take_if_confirmed(&self, question_id: &str, reply: &str) -> Option<ToolCallMsg> {
        self.evict_expired();
        let (_, pending) = self.entries.remove(question_id)?;
        if is_proceed_reply(reply) {
            Some(pending.call)
        } else {
            None
        }
    }

    /// Drops the slot without side effects (e.g. client disconnect).
    pub fn release(&self, question_id: &str) {
        self.entries.remove(question_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, v| v.parked_at.elapsed() <= ttl);
    }
}

/// True when a tool reply confirms the parked action.
///
/// Case-insensitive and tolerant of wrapper shapes like
/// `User has answered your questions: ... = "Proceed (Recommended)"`.
pub fn is_proceed_reply(reply: &str) -> bool {
    reply.to_ascii_lowercase().contains("proceed (recommended)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> ToolCallMsg {
        ToolCallMsg::function("bash", r#"{"command":"rm -rf tmp"}"#)
    }

    #[test]
    fn proceed_reply_is_case_insensitive_and_wrapper_tolerant() {
        assert!(is_proceed_reply("Proceed (Recommended)"));
        assert!(is_proceed_reply("PROCEED (RECOMMENDED)"));
        assert!(is_proceed_reply(
            r#"User has answered your questions: run it? = "Proceed (Recommended)""#
        ));
        assert!(!is_proceed_reply("Cancel"));
        assert!(!is_proceed_reply("proceed"));
    }

    #[test]
    fn parked_call_replays_on_confirmation() {
        let map = PendingConfirmations::default();
        map.park("call_q1", call());
        let replay = map.take_if_confirmed("call_q1", "Proceed (Recommended)");
        assert_eq!(replay.unwrap().function.name, "bash");
        assert!(map.is_empty());
    }

    #[test]
    fn rejection_releases_without_replay() {
        let map = PendingConfirmations::default();
        map.park("call_q2", call());
        assert!(map.take_if_confirmed("call_q2", "No, cancel").is_none());
        assert!(map.is_empty(), "slot released either way");
    }

    #[test]
    fn unknown_id_yields_nothing() {
        let map = PendingConfirmations::default();
        assert!(map
            .take_if_confirmed("call_missing", "Proceed (Recommended)")
            .is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let map = PendingConfirmations::new(Duration::from_millis(0));
        map.park("call_q3", call());
        std::thread::sleep(Duration::from_millis(5));
        assert!(map
            .take_if_confirmed("call_q3", "Proceed (Recommended)")
            .is_none());
    }

    #[test]
    fn last_write_wins_per_id() {
        let map = PendingConfirmations::default();
        map.park("call_q4", ToolCallMsg::function("bash", r#"{"command":"a"}"#));
        map.park("call_q4", ToolCallMsg::function("bash", r#"{"command":"b"}"#));
        let replay = map
            .take_if_confirmed("call_q4", "Proceed (Recommended)")
            .unwrap();
        assert!(replay.function.arguments.contains('b'));
    }
}
