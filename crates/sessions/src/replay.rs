use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uag_protocol::Envelope;

/// Bounded, append-only ring buffer of recent envelopes used exclusively to
/// hydrate a reconnecting client (§4.2, §4.10). Distinct from [`crate::outbound::OutboundQueue`]:
/// the queue exists because the transport may not be attached, the buffer
/// exists so a reconnecting client can re-observe recent history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayBuffer {
    cap: usize,
    entries: VecDeque<Envelope>,
}

impl ReplayBuffer {
    pub const DEFAULT_CAP: usize = 1000;

    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Append one envelope, evicting the oldest entry if at capacity.
    pub fn push(&mut self, envelope: Envelope) {
        if self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(envelope);
    }

    /// All buffered envelopes, oldest first.
    pub fn get_all(&self) -> Vec<Envelope> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uag_protocol::ErrorCode;

    fn marker(n: u32) -> Envelope {
        Envelope::Error {
            session_id: None,
            code: ErrorCode::InternalError,
            message: n.to_string(),
        }
    }

    fn text(e: &Envelope) -> String {
        match e {
            Envelope::Error { message, .. } => message.clone(),
            _ => panic!("unexpected"),
        }
    }

    #[test]
    fn never_exceeds_cap() {
        let mut buf = ReplayBuffer::new(3);
        for i in 0..10 {
            buf.push(marker(i));
        }
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buf = ReplayBuffer::new(2);
        buf.push(marker(1));
        buf.push(marker(2));
        buf.push(marker(3));
        let all = buf.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(text(&all[0]), "2");
        assert_eq!(text(&all[1]), "3");
    }
}
