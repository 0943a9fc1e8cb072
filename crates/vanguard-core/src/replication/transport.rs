//! Byte transports between peers.
//!
//! The core only needs "send these bytes to everyone (or to one peer)" and
//! "give me what arrived, and from whom", preserving per-sender order. The
//! sender id is stamped by the transport, never read from the payload. [`LoopbackNetwork`]
//! provides that over `std::sync::mpsc` channels inside one process; real
//! deployments plug their session layer in behind the same trait.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;
use tracing::warn;

use crate::session::PeerId;

/// Transport failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No peer with that id is connected
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    /// The peer's receiving end is gone
    #[error("{0} disconnected")]
    Disconnected(PeerId),
}

/// Addressee of a send.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PeerTarget {
    /// Every connected peer, the sender included
    All,
    /// One peer
    Peer(PeerId),
}

/// Ordered, reliable byte delivery between peers.
pub trait Transport {
    /// Id of the peer owning this endpoint.
    fn local_peer(&self) -> PeerId;

    /// Queues `bytes` for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the addressee cannot be reached.
    fn send(&mut self, target: PeerTarget, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Takes everything delivered so far, oldest first, each paired with the
    /// id of the peer that sent it. Never blocks.
    fn drain(&mut self) -> Vec<(PeerId, Vec<u8>)>;
}

/// In-process network of peers.
///
/// Cloning yields another handle to the same network.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    peers: Rc<RefCell<BTreeMap<PeerId, Sender<(PeerId, Vec<u8>)>>>>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a peer and returns its endpoint. Reconnecting an id replaces
    /// the previous endpoint.
    #[must_use]
    pub fn connect(&self, peer: PeerId) -> LoopbackTransport {
        let (tx, rx) = mpsc::channel();
        self.peers.borrow_mut().insert(peer, tx);
        LoopbackTransport {
            local: peer,
            network: self.clone(),
            inbox: rx,
        }
    }

    /// Connected peer ids, in order.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.borrow().keys().copied().collect()
    }
}

/// One peer's endpoint on a [`LoopbackNetwork`].
#[derive(Debug)]
pub struct LoopbackTransport {
    local: PeerId,
    network: LoopbackNetwork,
    inbox: Receiver<(PeerId, Vec<u8>)>,
}

impl Transport for LoopbackTransport {
    fn local_peer(&self) -> PeerId {
        self.local
    }

    fn send(&mut self, target: PeerTarget, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut peers = self.network.peers.borrow_mut();
        match target {
            PeerTarget::Peer(id) => {
                let tx = peers.get(&id).ok_or(TransportError::UnknownPeer(id))?;
                tx.send((self.local, bytes))
                    .map_err(|_| TransportError::Disconnected(id))
            }
            PeerTarget::All => {
                let mut gone = Vec::new();
                for (id, tx) in peers.iter() {
                    if tx.send((self.local, bytes.clone())).is_err() {
                        gone.push(*id);
                    }
                }
                for id in gone {
                    warn!(peer = %id, "dropping disconnected peer from loopback network");
                    peers.remove(&id);
                }
                Ok(())
            }
        }
    }

    fn drain(&mut self) -> Vec<(PeerId, Vec<u8>)> {
        self.inbox.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_every_peer_including_sender() {
        let network = LoopbackNetwork::new();
        let mut a = network.connect(PeerId::new(1));
        let mut b = network.connect(PeerId::new(2));

        a.send(PeerTarget::All, b"ping".to_vec()).unwrap();

        assert_eq!(a.drain(), vec![(PeerId::new(1), b"ping".to_vec())]);
        assert_eq!(b.drain(), vec![(PeerId::new(1), b"ping".to_vec())]);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn preserves_send_order() {
        let network = LoopbackNetwork::new();
        let mut a = network.connect(PeerId::new(1));
        let mut b = network.connect(PeerId::new(2));

        for i in 0..5u8 {
            a.send(PeerTarget::Peer(PeerId::new(2)), vec![i]).unwrap();
        }

        assert_eq!(
            b.drain(),
            (0..5u8)
                .map(|i| (PeerId::new(1), vec![i]))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn deliveries_carry_sender_id() {
        let network = LoopbackNetwork::new();
        let mut a = network.connect(PeerId::new(1));
        let mut b = network.connect(PeerId::new(2));
        let mut c = network.connect(PeerId::new(3));

        a.send(PeerTarget::Peer(PeerId::new(3)), vec![1]).unwrap();
        b.send(PeerTarget::Peer(PeerId::new(3)), vec![2]).unwrap();

        assert_eq!(
            c.drain(),
            vec![(PeerId::new(1), vec![1]), (PeerId::new(2), vec![2])]
        );
    }

    #[test]
    fn unknown_peer_is_an_error() {
        let network = LoopbackNetwork::new();
        let mut a = network.connect(PeerId::new(1));
        assert_eq!(
            a.send(PeerTarget::Peer(PeerId::new(7)), vec![1]),
            Err(TransportError::UnknownPeer(PeerId::new(7)))
        );
    }

    #[test]
    fn dropped_endpoint_is_pruned_on_broadcast() {
        let network = LoopbackNetwork::new();
        let mut a = network.connect(PeerId::new(1));
        let b = network.connect(PeerId::new(2));
        drop(b);

        assert!(a.send(PeerTarget::All, vec![1]).is_ok());
        assert_eq!(network.peers(), vec![PeerId::new(1)]);
    }
}
