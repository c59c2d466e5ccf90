//! Attach transport (§4.9): one WebSocket endpoint per session, multiple
//! concurrent peers broadcast raw to each other.

pub mod ws;

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use uag_protocol::Envelope;

const BROADCAST_CAPACITY: usize = 256;

struct SessionChannel {
    tx: broadcast::Sender<Envelope>,
    peers: usize,
}

/// Fans outbound envelopes out to every peer currently attached to a
/// session (§4.9 "frames from one peer are broadcast raw to the others").
/// One broadcast channel per session, created lazily on first attach and
/// torn down once the last peer detaches.
#[derive(Default)]
pub struct PeerHub {
    channels: Mutex<HashMap<String, SessionChannel>>,
}

impl PeerHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new peer attachment, returning a sender (for this peer's
    /// own broadcasts) and a fresh receiver (for everything else, including
    /// this peer's own attach-sequence envelopes).
    pub fn attach(&self, session_id: &str) -> (broadcast::Sender<Envelope>, broadcast::Receiver<Envelope>) {
        let mut channels = self.channels.lock();
        let entry = channels.entry(session_id.to_owned()).or_insert_with(|| SessionChannel {
            tx: broadcast::channel(BROADCAST_CAPACITY).0,
            peers: 0,
        });
        entry.peers += 1;
        (entry.tx.clone(), entry.tx.subscribe())
    }

    /// Unregister a peer. Returns the number of peers still attached.
    pub fn detach(&self, session_id: &str) -> usize {
        let mut channels = self.channels.lock();
        let Some(entry) = channels.get_mut(session_id) else {
            return 0;
        };
        entry.peers = entry.peers.saturating_sub(1);
        let remaining = entry.peers;
        if remaining == 0 {
            channels.remove(session_id);
        }
        remaining
    }

    /// Broadcast one envelope to every peer attached to `session_id`. A
    /// lagged or closed receiver is the other peer's problem, not the
    /// sender's — `send` only fails when there are zero receivers, which is
    /// a harmless race with a peer detaching mid-broadcast.
    pub fn broadcast(&self, session_id: &str, envelope: Envelope) {
        let channels = self.channels.lock();
        if let Some(entry) = channels.get(session_id) {
            let _ = entry.tx.send(envelope);
        }
    }

    pub fn peer_count(&self, session_id: &str) -> usize {
        self.channels.lock().get(session_id).map(|e| e.peers).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_increments_and_detach_decrements_peer_count() {
        let hub = PeerHub::new();
        let (_tx1, _rx1) = hub.attach("s1");
        assert_eq!(hub.peer_count("s1"), 1);

        let (_tx2, _rx2) = hub.attach("s1");
        assert_eq!(hub.peer_count("s1"), 2);

        assert_eq!(hub.detach("s1"), 1);
        assert_eq!(hub.detach("s1"), 0);
    }

    #[test]
    fn detaching_unknown_session_is_a_harmless_no_op() {
        let hub = PeerHub::new();
        assert_eq!(hub.detach("does-not-exist"), 0);
        assert_eq!(hub.peer_count("does-not-exist"), 0);
    }

    #[test]
    fn broadcast_reaches_other_attached_peers_but_not_other_sessions() {
        let hub = PeerHub::new();
        let (_tx1, mut rx1) = hub.attach("s1");
        let (_tx2, mut rx2) = hub.attach("s2");

        hub.broadcast("s1", Envelope::KeepAlive {});

        assert!(matches!(rx1.try_recv(), Ok(Envelope::KeepAlive { .. })));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn last_peer_detaching_tears_down_the_channel() {
        let hub = PeerHub::new();
        let (_tx, _rx) = hub.attach("s1");
        hub.detach("s1");
        assert!(hub.channels.lock().get("s1").is_none());
    }
}
