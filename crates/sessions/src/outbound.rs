use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uag_protocol::Envelope;

/// Per-session FIFO of envelopes pending delivery, deduplicated by id (§4.2).
///
/// `enqueue` is idempotent for a repeat id while it sits unsent; once
/// `flush` hands an entry to the send callback its id is forgotten, so a
/// later re-enqueue of the same id is accepted again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundQueue {
    seen: HashSet<String>,
    queue: VecDeque<(String, Envelope)>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `env` under `id`. No-op if `id` is already queued and unsent.
    pub fn enqueue(&mut self, id: impl Into<String>, env: Envelope) {
        let id = id.into();
        if self.seen.contains(&id) {
            return;
        }
        self.seen.insert(id.clone());
        self.queue.push_back((id, env));
    }

    /// Drain the queue in FIFO order, handing each envelope to `send`. The
    /// id is removed from `seen` as it's handed off, so a subsequent
    /// `enqueue` of the same id starts a fresh unsent window.
    pub fn flush(&mut self, mut send: impl FnMut(&Envelope)) {
        while let Some((id, env)) = self.queue.pop_front() {
            self.seen.remove(&id);
            send(&env);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uag_protocol::ErrorCode;

    fn marker(n: &str) -> Envelope {
        Envelope::Error {
            session_id: None,
            code: ErrorCode::InternalError,
            message: n.to_string(),
        }
    }

    #[test]
    fn duplicate_enqueue_before_drain_is_a_no_op() {
        let mut q = OutboundQueue::new();
        q.enqueue("a", marker("first"));
        q.enqueue("a", marker("second"));
        assert_eq!(q.len(), 1);

        let mut delivered = Vec::new();
        q.flush(|e| {
            if let Envelope::Error { message, .. } = e {
                delivered.push(message.clone());
            }
        });
        assert_eq!(delivered, vec!["first"]);
    }

    #[test]
    fn reenqueue_after_flush_is_accepted() {
        let mut q = OutboundQueue::new();
        q.enqueue("a", marker("first"));
        q.flush(|_| {});
        q.enqueue("a", marker("second"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn preserves_fifo_order() {
        let mut q = OutboundQueue::new();
        q.enqueue("a", marker("1"));
        q.enqueue("b", marker("2"));
        q.enqueue("c", marker("3"));
        let mut order = Vec::new();
        q.flush(|e| {
            if let Envelope::Error { message, .. } = e {
                order.push(message.clone());
            }
        });
        assert_eq!(order, vec!["1", "2", "3"]);
    }
}
