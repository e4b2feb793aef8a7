//! Streaming surfaces over the block notifier.

use crate::ValidatorServer;
use crate::events::BlockEvent;
use futures::Stream;
use slot_clock::SlotClock;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use types::{EthSpec, SignedBeaconBlock};

impl<E: EthSpec, S: SlotClock> ValidatorServer<E, S> {
    /// `StreamBlocks(verified_only)`: every block entering the chain, in
    /// receipt order. With `verified_only`, gossip-observed but unverified
    /// blocks are skipped. A slow consumer drops the oldest events rather
    /// than stalling the chain.
    pub fn stream_blocks(
        &self,
        verified_only: bool,
    ) -> impl Stream<Item = Arc<SignedBeaconBlock<E>>> + use<E, S> {
        BroadcastStream::new(self.block_notifier.subscribe()).filter_map(move |event| {
            match event {
                Ok(BlockEvent::ReceivedBlock {
                    verified, block, ..
                }) if verified || !verified_only => Some(block),
                // Unverified block filtered out, or the subscriber lagged
                // and lost events.
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRig;
    use types::{Hash256, MinimalEthSpec, Slot};

    type E = MinimalEthSpec;

    #[tokio::test]
    async fn stream_delivers_blocks_in_order() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let mut stream = Box::pin(rig.server().stream_blocks(false));

        rig.emit_block_event(Slot::new(1), Hash256::repeat_byte(1), true);
        rig.emit_block_event(Slot::new(2), Hash256::repeat_byte(2), false);

        assert_eq!(stream.next().await.unwrap().slot(), Slot::new(1));
        assert_eq!(stream.next().await.unwrap().slot(), Slot::new(2));
    }

    #[tokio::test]
    async fn verified_only_filters_unverified() {
        let rig = TestRig::<E>::new(8).at_slot(5);
        let mut stream = Box::pin(rig.server().stream_blocks(true));

        rig.emit_block_event(Slot::new(1), Hash256::repeat_byte(1), false);
        rig.emit_block_event(Slot::new(2), Hash256::repeat_byte(2), true);

        // The unverified block at slot 1 never surfaces.
        assert_eq!(stream.next().await.unwrap().slot(), Slot::new(2));
    }
}
