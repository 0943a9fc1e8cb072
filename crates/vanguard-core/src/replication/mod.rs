//! Authority replication.
//!
//! The [`Replicator`] is the only path by which a decision leaves the
//! authority. It stamps each [`ReplicationMessage`] into an [`Envelope`]
//! with a strictly increasing sequence number and an [`OutcomeId`] shared by
//! the whole decision, encodes it, and hands the bytes to a [`Transport`].
//! Replicas use the same type to receive; they can never broadcast.
//!
//! # Invariants
//!
//! - Only a replicator constructed with [`Role::Authority`] sends
//! - Sequence numbers never repeat within a session
//! - Messages of one outcome are sent contiguously, in the order given

mod message;
mod transport;

pub use message::{AttackReport, Envelope, HitRoll, OutcomeId, ReplicationMessage};
pub use transport::{LoopbackNetwork, LoopbackTransport, PeerTarget, Transport, TransportError};

use thiserror::Error;
use tracing::{trace, warn};

use crate::session::{PeerId, Role};

/// Replication failure.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Broadcast attempted from a replica
    #[error("only the authority may broadcast")]
    NotAuthority,
    /// Transport could not deliver
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Envelope could not be encoded
    #[error("failed to encode envelope: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Sends and receives envelopes over a [`Transport`].
#[derive(Debug)]
pub struct Replicator<T: Transport> {
    transport: T,
    role: Role,
    next_sequence: u64,
    next_outcome: u64,
}

impl<T: Transport> Replicator<T> {
    /// Creates a replicator for a peer of the given role.
    #[must_use]
    pub fn new(transport: T, role: Role) -> Self {
        Self {
            transport,
            role,
            next_sequence: 0,
            next_outcome: 0,
        }
    }

    /// Role this replicator was built for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Broadcasts one decision to every peer, the sender included.
    ///
    /// # Errors
    ///
    /// [`ReplicationError::NotAuthority`] on a replica; otherwise encoding or
    /// transport failures. Messages already sent before a failure are not
    /// retracted.
    pub fn broadcast(
        &mut self,
        messages: Vec<ReplicationMessage>,
        tick: u64,
    ) -> Result<OutcomeId, ReplicationError> {
        if self.role != Role::Authority {
            return Err(ReplicationError::NotAuthority);
        }

        let outcome = OutcomeId::new(self.next_outcome);
        self.next_outcome += 1;

        for message in messages {
            let envelope = Envelope {
                sequence: self.next_sequence,
                outcome,
                tick,
                message,
            };
            let bytes = envelope.to_bytes()?;
            self.next_sequence += 1;
            trace!(
                sequence = envelope.sequence,
                %outcome,
                kind = envelope.message.kind(),
                "broadcast"
            );
            self.transport.send(PeerTarget::All, bytes)?;
        }
        Ok(outcome)
    }

    /// Decodes everything delivered so far, each envelope paired with its
    /// sender. Undecodable payloads are logged and skipped.
    pub fn receive(&mut self) -> Vec<(PeerId, Envelope)> {
        let local = self.transport.local_peer();
        self.transport
            .drain()
            .into_iter()
            .filter_map(|(sender, bytes)| match Envelope::from_bytes(&bytes) {
                Ok(envelope) => Some((sender, envelope)),
                Err(error) => {
                    warn!(peer = %local, %sender, %error, "dropping undecodable envelope");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    fn destroy(id: u64) -> ReplicationMessage {
        ReplicationMessage::DestroySummon {
            entity_id: EntityId::new(id),
        }
    }

    #[test]
    fn replica_cannot_broadcast() {
        let network = LoopbackNetwork::new();
        let mut replica = Replicator::new(network.connect(PeerId::new(2)), Role::Replica);

        assert!(matches!(
            replica.broadcast(vec![destroy(1)], 0),
            Err(ReplicationError::NotAuthority)
        ));
    }

    #[test]
    fn sequences_increase_across_outcomes() {
        let network = LoopbackNetwork::new();
        let mut authority = Replicator::new(network.connect(PeerId::new(1)), Role::Authority);
        let mut replica = Replicator::new(network.connect(PeerId::new(2)), Role::Replica);

        let first = authority.broadcast(vec![destroy(1), destroy(2)], 4).unwrap();
        let second = authority.broadcast(vec![destroy(3)], 5).unwrap();
        let received = replica.receive();

        assert_ne!(first, second);
        assert_eq!(
            received.iter().map(|(_, e)| e.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(received.iter().all(|(from, _)| *from == PeerId::new(1)));
        assert_eq!(received[0].1.outcome, first);
        assert_eq!(received[1].1.outcome, first);
        assert_eq!(received[2].1.outcome, second);
        assert_eq!(received[2].1.tick, 5);
    }

    #[test]
    fn authority_receives_its_own_broadcast() {
        let network = LoopbackNetwork::new();
        let mut authority = Replicator::new(network.connect(PeerId::new(1)), Role::Authority);

        authority.broadcast(vec![destroy(7)], 0).unwrap();

        let own = authority.receive();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].0, PeerId::new(1));
        assert_eq!(own[0].1.message, destroy(7));
    }

    #[test]
    fn undecodable_payload_is_skipped() {
        let network = LoopbackNetwork::new();
        let mut raw = network.connect(PeerId::new(9));
        let mut replica = Replicator::new(network.connect(PeerId::new(2)), Role::Replica);

        raw.send(PeerTarget::Peer(PeerId::new(2)), b"garbage".to_vec())
            .unwrap();

        assert!(replica.receive().is_empty());
    }
}
