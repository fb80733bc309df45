//! Block State: a [`BlockHeaderState`] paired with the block that produced it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    block::{SignedBlock, SignedBlockHeader},
    data_types::{BlockId, BlockNum, BlockTimestamp, Digest, ProducerName, SignatureBytes},
    features::ProtocolFeatureActivationSet,
    merkle::IncrementalMerkle,
    producer_schedule::{PendingSchedule, ProducerSchedule, VerifyingKeyBytes},
};

use super::BlockHeaderState;

/// A block and the header state it left behind, as stored in the fork database.
///
/// `validated` records whether this node has fully applied the block's transactions (as opposed
/// to having merely validated its header). Only validated blocks can become the fork database's
/// root. The flag is atomic because validation happens after the state is shared through `Arc`s.
#[derive(Debug)]
pub struct BlockState {
    header_state: BlockHeaderState,
    block: Option<SignedBlock>,
    validated: AtomicBool,
}

impl BlockState {
    /// Create a new, not-yet-validated `BlockState` for `block`.
    pub fn new(header_state: BlockHeaderState, block: SignedBlock) -> Self {
        Self {
            header_state,
            block: Some(block),
            validated: AtomicBool::new(false),
        }
    }

    /// Create a `BlockState` that is already validated, e.g. a genesis or snapshot-restored
    /// state. `block` may be `None` for states whose block body is no longer available.
    pub fn new_validated(header_state: BlockHeaderState, block: Option<SignedBlock>) -> Self {
        Self {
            header_state,
            block,
            validated: AtomicBool::new(true),
        }
    }

    /// Get the id of this block.
    pub fn id(&self) -> BlockId {
        self.header_state.id
    }

    /// Get the number of this block.
    pub fn block_num(&self) -> BlockNum {
        self.header_state.block_num
    }

    /// Get the id of this block's predecessor.
    pub fn previous(&self) -> BlockId {
        self.header_state.previous()
    }

    /// Get the timestamp of this block.
    pub fn timestamp(&self) -> BlockTimestamp {
        self.header_state.timestamp()
    }

    /// Get the DPOS irreversible block number implied by this block.
    pub fn dpos_irreversible_blocknum(&self) -> BlockNum {
        self.header_state.dpos_irreversible_blocknum
    }

    /// Get this block's header state.
    pub fn header_state(&self) -> &BlockHeaderState {
        &self.header_state
    }

    /// Get this block's signed header.
    pub fn signed_header(&self) -> &SignedBlockHeader {
        &self.header_state.header
    }

    /// Get this block's body, if it is available.
    pub fn block(&self) -> Option<&SignedBlock> {
        self.block.as_ref()
    }

    /// Check whether this block has been fully applied by this node.
    pub fn is_validated(&self) -> bool {
        self.validated.load(Ordering::Relaxed)
    }

    pub(crate) fn set_validated(&self, validated: bool) {
        self.validated.store(validated, Ordering::Relaxed)
    }
}

impl Clone for BlockState {
    fn clone(&self) -> Self {
        Self {
            header_state: self.header_state.clone(),
            block: self.block.clone(),
            validated: AtomicBool::new(self.is_validated()),
        }
    }
}

impl PartialEq for BlockState {
    fn eq(&self, other: &Self) -> bool {
        self.header_state == other.header_state
            && self.block == other.block
            && self.is_validated() == other.is_validated()
    }
}

/// Intermediate representation of a [`PendingSchedule`] that can be serialized and deserialized
/// with borsh.
#[derive(BorshSerialize, BorshDeserialize)]
pub(crate) struct PendingScheduleBytes {
    schedule_lib_num: BlockNum,
    schedule_hash: Digest,
    schedule: ProducerSchedule,
}

/// Intermediate representation of a [`BlockHeaderState`] that can be serialized and deserialized
/// with borsh.
#[derive(BorshSerialize, BorshDeserialize)]
pub(crate) struct BlockHeaderStateBytes {
    id: BlockId,
    block_num: BlockNum,
    header: SignedBlockHeader,
    dpos_proposed_irreversible_blocknum: BlockNum,
    dpos_irreversible_blocknum: BlockNum,
    active_schedule: ProducerSchedule,
    pending_schedule: Option<PendingScheduleBytes>,
    blockroot_merkle: IncrementalMerkle,
    producer_to_last_produced: BTreeMap<ProducerName, BlockNum>,
    producer_to_last_implied_irb: BTreeMap<ProducerName, BlockNum>,
    valid_block_signing_key: VerifyingKeyBytes,
    confirm_count: Vec<u8>,
    activated_protocol_features: ProtocolFeatureActivationSet,
    additional_signatures: Vec<SignatureBytes>,
}

/// Intermediate representation of a [`BlockState`] that can be serialized and deserialized with
/// borsh.
#[derive(BorshSerialize, BorshDeserialize)]
pub(crate) struct BlockStateBytes {
    header_state: BlockHeaderStateBytes,
    block: Option<SignedBlock>,
    validated: bool,
}

impl From<&BlockState> for BlockStateBytes {
    fn from(block_state: &BlockState) -> Self {
        let header_state = &block_state.header_state;
        BlockStateBytes {
            header_state: BlockHeaderStateBytes {
                id: header_state.id,
                block_num: header_state.block_num,
                header: header_state.header.clone(),
                dpos_proposed_irreversible_blocknum: header_state
                    .dpos_proposed_irreversible_blocknum,
                dpos_irreversible_blocknum: header_state.dpos_irreversible_blocknum,
                active_schedule: (*header_state.active_schedule).clone(),
                pending_schedule: header_state.pending_schedule.as_ref().map(|pending| {
                    PendingScheduleBytes {
                        schedule_lib_num: pending.schedule_lib_num,
                        schedule_hash: pending.schedule_hash,
                        schedule: (*pending.schedule).clone(),
                    }
                }),
                blockroot_merkle: header_state.blockroot_merkle.clone(),
                producer_to_last_produced: header_state.producer_to_last_produced.clone(),
                producer_to_last_implied_irb: header_state.producer_to_last_implied_irb.clone(),
                valid_block_signing_key: header_state.valid_block_signing_key,
                confirm_count: header_state.confirm_count.clone(),
                activated_protocol_features: (*header_state.activated_protocol_features).clone(),
                additional_signatures: header_state.additional_signatures.clone(),
            },
            block: block_state.block.clone(),
            validated: block_state.is_validated(),
        }
    }
}

impl From<BlockStateBytes> for BlockState {
    fn from(bytes: BlockStateBytes) -> Self {
        let header_state = BlockHeaderState {
            id: bytes.header_state.id,
            block_num: bytes.header_state.block_num,
            header: bytes.header_state.header,
            dpos_proposed_irreversible_blocknum: bytes
                .header_state
                .dpos_proposed_irreversible_blocknum,
            dpos_irreversible_blocknum: bytes.header_state.dpos_irreversible_blocknum,
            active_schedule: Arc::new(bytes.header_state.active_schedule),
            pending_schedule: bytes.header_state.pending_schedule.map(|pending| {
                PendingSchedule {
                    schedule_lib_num: pending.schedule_lib_num,
                    schedule_hash: pending.schedule_hash,
                    schedule: Arc::new(pending.schedule),
                }
            }),
            blockroot_merkle: bytes.header_state.blockroot_merkle,
            producer_to_last_produced: bytes.header_state.producer_to_last_produced,
            producer_to_last_implied_irb: bytes.header_state.producer_to_last_implied_irb,
            valid_block_signing_key: bytes.header_state.valid_block_signing_key,
            confirm_count: bytes.header_state.confirm_count,
            activated_protocol_features: Arc::new(bytes.header_state.activated_protocol_features),
            additional_signatures: bytes.header_state.additional_signatures,
        };
        BlockState {
            header_state,
            block: bytes.block,
            validated: AtomicBool::new(bytes.validated),
        }
    }
}
