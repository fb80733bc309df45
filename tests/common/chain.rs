//! Helpers for building test chains: producer keypairs, schedules, and signed blocks.

use std::collections::BTreeMap;
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use rand_core::OsRng;

use fork_db::header_state::block_state::BlockState;
use fork_db::header_state::{BlockHeaderState, HeaderStateError};
use fork_db::types::block::SignedBlock;
use fork_db::types::data_types::{
    BlockTimestamp, Digest, ProducerName, ScheduleVersion, SignatureBytes,
};
use fork_db::types::features::{
    FeatureSet, FeatureValidationError, FeatureValidator, ProtocolFeatureActivationSet,
};
use fork_db::types::producer_schedule::{ProducerAuthority, ProducerSchedule};

/// A feature set that recognizes every feature digest.
pub(crate) struct OpenFeatureSet;

impl FeatureSet for OpenFeatureSet {
    fn is_recognized(&self, _feature: &Digest) -> bool {
        true
    }
}

/// A feature set that recognizes only the listed feature digests.
pub(crate) struct ListedFeatureSet {
    pub(crate) recognized: Vec<Digest>,
}

impl FeatureSet for ListedFeatureSet {
    fn is_recognized(&self, feature: &Digest) -> bool {
        self.recognized.contains(feature)
    }
}

/// A feature validator that accepts every activation.
pub(crate) fn accept_all(
    _when: BlockTimestamp,
    _activated: &ProtocolFeatureActivationSet,
    _new_features: &[Digest],
) -> Result<(), FeatureValidationError> {
    Ok(())
}

/// A test chain: a producer schedule together with the producers' signing keys.
pub(crate) struct TestChain {
    keys: BTreeMap<ProducerName, SigningKey>,
    pub(crate) schedule: ProducerSchedule,
}

impl TestChain {
    /// Create a `TestChain` with freshly generated keypairs for `producer_names`, as schedule
    /// version 1.
    pub(crate) fn new(producer_names: &[&str]) -> Self {
        let mut keys = BTreeMap::new();
        let mut producers = Vec::new();
        for name in producer_names {
            let signing_key = SigningKey::generate(&mut OsRng);
            let producer_name = ProducerName::new(name);
            producers.push(ProducerAuthority {
                producer_name: producer_name.clone(),
                block_signing_key: signing_key.verifying_key().to_bytes(),
            });
            keys.insert(producer_name, signing_key);
        }
        Self {
            keys,
            schedule: ProducerSchedule::new(ScheduleVersion::new(1), producers),
        }
    }

    /// Get the genesis header state: block 1 at slot 0.
    pub(crate) fn genesis(&self) -> BlockHeaderState {
        BlockHeaderState::genesis(BlockTimestamp::new(0), self.schedule.clone())
    }

    /// Build the schedule that would follow the current one, with the given producers.
    /// New names get freshly generated keypairs.
    pub(crate) fn next_schedule(&mut self, producer_names: &[&str]) -> ProducerSchedule {
        let mut producers = Vec::new();
        for name in producer_names {
            let producer_name = ProducerName::new(name);
            let signing_key = self
                .keys
                .entry(producer_name.clone())
                .or_insert_with(|| SigningKey::generate(&mut OsRng));
            producers.push(ProducerAuthority {
                producer_name,
                block_signing_key: signing_key.verifying_key().to_bytes(),
            });
        }
        ProducerSchedule::new(self.schedule.version + 1, producers)
    }

    /// Produce and sign the block following `prev` at timestamp `when`, with full control over
    /// the header's contents.
    pub(crate) fn try_produce(
        &self,
        prev: &BlockHeaderState,
        when: BlockTimestamp,
        confirmed: u16,
        action_mroot: Digest,
        new_producers: Option<ProducerSchedule>,
        feature_activations: Vec<Digest>,
        feature_set: &dyn FeatureSet,
        validator: FeatureValidator<'_>,
    ) -> Result<BlockHeaderState, HeaderStateError> {
        let pending = prev.next(when, confirmed)?;
        let header = pending.make_header(
            Digest::default(),
            action_mroot,
            new_producers,
            feature_activations,
        )?;
        let signing_key = self
            .keys
            .get(&pending.producer)
            .expect("the scheduled producer has a registered key");
        pending.finish_next_with_signer(header, feature_set, validator, |digest| {
            SignatureBytes::new(signing_key.sign(&digest.bytes()).to_bytes())
        })
    }

    /// Produce the block following `prev` at timestamp `when`.
    pub(crate) fn produce(
        &self,
        prev: &BlockHeaderState,
        when: BlockTimestamp,
        confirmed: u16,
    ) -> BlockHeaderState {
        self.try_produce(
            prev,
            when,
            confirmed,
            Digest::default(),
            None,
            Vec::new(),
            &OpenFeatureSet,
            &accept_all,
        )
        .expect("block production should succeed")
    }

    /// Produce a block like [`produce`](Self::produce), but with a distinguishing action merkle
    /// root so that sibling blocks at the same slot get different ids.
    pub(crate) fn produce_distinct(
        &self,
        prev: &BlockHeaderState,
        when: BlockTimestamp,
        confirmed: u16,
        tag: u8,
    ) -> BlockHeaderState {
        self.try_produce(
            prev,
            when,
            confirmed,
            Digest::new([tag; 32]),
            None,
            Vec::new(),
            &OpenFeatureSet,
            &accept_all,
        )
        .expect("block production should succeed")
    }
}

/// Wrap a produced header state into a not-yet-validated [`BlockState`] with an empty block body.
pub(crate) fn block_state(header_state: BlockHeaderState) -> Arc<BlockState> {
    let block = SignedBlock::new(header_state.header.clone(), Vec::new());
    Arc::new(BlockState::new(header_state, block))
}

/// Build the validated root [`BlockState`] for a chain's genesis block.
pub(crate) fn genesis_block_state(chain: &TestChain) -> BlockState {
    BlockState::new_validated(chain.genesis(), None)
}
