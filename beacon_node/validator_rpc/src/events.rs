//! Bounded publish-subscribe feeds for operations, blocks and chain state.
//!
//! Publication never blocks: each subscriber owns a ring buffer and a slow
//! subscriber loses the oldest events rather than back-pressuring the
//! publisher. Publishing with no subscribers is a no-op.

use std::sync::Arc;
use tokio::sync::broadcast::{self, Receiver, Sender, error::SendError};
use tracing::trace;
use types::{
    Attestation, EthSpec, Hash256, PayloadAttestationMessage, SignedAggregateAndProof,
    SignedBeaconBlock, SignedBlsToExecutionChange, SignedContributionAndProof,
    SignedVoluntaryExit, Slot, SyncCommitteeMessage,
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Operations received from validators, published before broadcast.
#[derive(Debug, Clone)]
pub enum OperationEvent<E: EthSpec> {
    UnaggregatedAttReceived(Box<Attestation<E>>),
    AggregatedAttReceived(Box<SignedAggregateAndProof<E>>),
    ExitReceived(Box<SignedVoluntaryExit>),
    SyncCommitteeMessageReceived(Box<SyncCommitteeMessage>),
    ContributionReceived(Box<SignedContributionAndProof<E>>),
    BlsToExecutionChangeReceived(Box<SignedBlsToExecutionChange>),
    PayloadAttestationReceived(Box<PayloadAttestationMessage>),
}

/// Blocks entering the chain, in receipt order.
#[derive(Debug, Clone)]
pub enum BlockEvent<E: EthSpec> {
    ReceivedBlock {
        root: Hash256,
        slot: Slot,
        /// Whether the block has passed full verification, or was merely
        /// observed on gossip.
        verified: bool,
        block: Arc<SignedBeaconBlock<E>>,
    },
}

/// Coarse chain-lifecycle events.
#[derive(Debug, Clone)]
pub enum StateEvent {
    ChainStarted {
        genesis_time: u64,
        genesis_validators_root: Hash256,
    },
    HeadUpdated {
        slot: Slot,
        root: Hash256,
        /// Set at epoch transitions, when activations and duty shufflings
        /// may have changed.
        epoch_transition: bool,
    },
}

/// A single bounded broadcast feed.
pub struct EventFeed<T: Clone> {
    sender: Sender<T>,
}

impl<T: Clone> EventFeed<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish without blocking. Returns how many subscribers will see the
    /// event; zero subscribers is not an error.
    pub fn send(&self, event: T) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(SendError(_)) => {
                trace!("no subscribers registered to listen for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventFeed<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

pub type OperationNotifier<E> = EventFeed<OperationEvent<E>>;
pub type BlockNotifier<E> = EventFeed<BlockEvent<E>>;
pub type StateNotifier = EventFeed<StateEvent>;

#[cfg(test)]
mod tests {
    use super::*;
    use types::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let feed = StateNotifier::default();
        let mut rx = feed.subscribe();
        let delivered = feed.send(StateEvent::ChainStarted {
            genesis_time: 1,
            genesis_validators_root: Hash256::ZERO,
        });
        assert_eq!(delivered, 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            StateEvent::ChainStarted { genesis_time: 1, .. }
        ));
    }

    #[test]
    fn publishing_without_subscribers_is_noop() {
        let feed = BlockNotifier::<E>::default();
        assert_eq!(feed.receiver_count(), 0);
        // Does not error or block.
        let delivered = feed.send(BlockEvent::ReceivedBlock {
            root: Hash256::ZERO,
            slot: Slot::new(0),
            verified: true,
            block: Arc::new(test_block()),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest() {
        let feed = EventFeed::<u64>::new(2);
        let mut rx = feed.subscribe();
        for i in 0..5 {
            feed.send(i);
        }
        // The first recv reports the lag, subsequent ones yield the
        // retained tail.
        let first = rx.recv().await;
        assert!(first.is_err());
        assert_eq!(rx.recv().await.unwrap(), 3);
        assert_eq!(rx.recv().await.unwrap(), 4);
    }

    fn test_block() -> SignedBeaconBlock<E> {
        use types::*;
        SignedBeaconBlock::from_block(
            BeaconBlock::Base(BeaconBlockBase {
                slot: Slot::new(0),
                proposer_index: 0,
                parent_root: Hash256::ZERO,
                state_root: Hash256::ZERO,
                body: BeaconBlockBodyBase {
                    randao_reveal: SignatureBytes::empty(),
                    eth1_data: Eth1Data::default(),
                    graffiti: Graffiti::ZERO,
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                },
            }),
            SignatureBytes::empty(),
        )
    }
}
