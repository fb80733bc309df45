//! Block Header State and the header validation state machine.
//!
//! A [`BlockHeaderState`] is everything a node needs to remember about a block, beyond its raw
//! header, in order to validate the *next* block on that branch: the active and pending producer
//! schedules, the merkle accumulator over prior block ids, per-producer bookkeeping for DPOS
//! irreversibility, and the set of activated protocol features.
//!
//! Applying a block is a two-phase transition:
//! 1. [`BlockHeaderState::next`] consumes a timestamp and an irreversibility claim and produces a
//!    [`PendingBlockHeaderState`]: everything that can be derived *before* the header's contents
//!    are known, including the scheduled producer, the new DPOS irreversible block number, and a
//!    possible pending-schedule promotion.
//! 2. [`PendingBlockHeaderState::finish_next`] consumes the actual signed header, checks it
//!    against the pending state field by field, interprets its extensions, verifies the producer
//!    signature, and yields the next `BlockHeaderState`.
//!
//! Producing a block uses the same machinery: [`PendingBlockHeaderState::make_header`] builds the
//! header that `finish_next` will accept, and
//! [`PendingBlockHeaderState::finish_next_with_signer`] signs it in place.

pub mod block_state;

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest as Sha256Digest, Sha256};

use crate::types::{
    block::{BlockHeader, SignedBlockHeader},
    data_types::{
        BlockId, BlockNum, BlockTimestamp, Digest, ProducerName, ScheduleVersion, SignatureBytes,
    },
    extensions::{
        ExtensionError, HeaderExtensions, ProducerScheduleChange, ProtocolFeatureActivation,
        PRODUCER_SCHEDULE_CHANGE_EXTENSION_ID, PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID,
    },
    features::{FeatureSet, FeatureValidator, ProtocolFeatureActivationSet},
    merkle::IncrementalMerkle,
    producer_schedule::{PendingSchedule, ProducerSchedule, VerifyingKeyBytes},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Upper bound on how many ancestor blocks' confirmation counters a state keeps. Confirmations
/// claimed for blocks older than this window are silently dropped.
pub const MAXIMUM_TRACKED_DPOS_CONFIRMATIONS: usize = 1024;

/// The validation state a block leaves behind for its successors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeaderState {
    pub id: BlockId,
    pub block_num: BlockNum,
    pub header: SignedBlockHeader,

    /// Highest ancestor block number that has gathered confirmations from more than two thirds of
    /// the active producers. Becomes irreversible once enough producers build on top of it.
    pub dpos_proposed_irreversible_blocknum: BlockNum,

    /// Highest ancestor block number that can no longer be forked out on this branch.
    pub dpos_irreversible_blocknum: BlockNum,

    pub active_schedule: Arc<ProducerSchedule>,
    pub pending_schedule: Option<PendingSchedule>,
    pub blockroot_merkle: IncrementalMerkle,

    /// For each known producer, the number of the last block it produced on this branch.
    pub producer_to_last_produced: BTreeMap<ProducerName, BlockNum>,

    /// For each known producer, the proposed-irreversible number implied by the last block it
    /// produced on this branch.
    pub producer_to_last_implied_irb: BTreeMap<ProducerName, BlockNum>,

    pub valid_block_signing_key: VerifyingKeyBytes,

    /// Outstanding confirmation counters for the most recent blocks on this branch, oldest first.
    /// An entry reaching zero advances `dpos_proposed_irreversible_blocknum` to its block.
    pub confirm_count: Vec<u8>,

    pub activated_protocol_features: Arc<ProtocolFeatureActivationSet>,
    pub additional_signatures: Vec<SignatureBytes>,
}

impl BlockHeaderState {
    /// Create the header state of a chain's genesis block.
    ///
    /// The genesis block is number 1, is produced by the first producer of `initial_schedule`,
    /// and is immediately irreversible. Both per-producer maps are seeded with every member of
    /// `initial_schedule` at the genesis block number.
    ///
    /// # Panics
    ///
    /// Panics if `initial_schedule` is empty.
    pub fn genesis(genesis_time: BlockTimestamp, initial_schedule: ProducerSchedule) -> Self {
        assert!(
            !initial_schedule.is_empty(),
            "the initial producer schedule must have at least one producer"
        );

        let genesis_producer = initial_schedule.producers[0].clone();
        let header = BlockHeader {
            timestamp: genesis_time,
            producer: genesis_producer.producer_name.clone(),
            confirmed: 1,
            previous: BlockId::default(),
            transaction_mroot: Digest::default(),
            action_mroot: Digest::default(),
            schedule_version: initial_schedule.version,
            header_extensions: HeaderExtensions::new(),
        };
        let id = header.calculate_id();
        let block_num = header.block_num();

        let producer_to_last_produced: BTreeMap<ProducerName, BlockNum> = initial_schedule
            .producers
            .iter()
            .map(|authority| (authority.producer_name.clone(), block_num))
            .collect();
        let producer_to_last_implied_irb = producer_to_last_produced.clone();

        Self {
            id,
            block_num,
            header: SignedBlockHeader::new(header, SignatureBytes::default()),
            dpos_proposed_irreversible_blocknum: block_num,
            dpos_irreversible_blocknum: block_num,
            active_schedule: Arc::new(initial_schedule),
            pending_schedule: None,
            blockroot_merkle: IncrementalMerkle::new(),
            producer_to_last_produced,
            producer_to_last_implied_irb,
            valid_block_signing_key: genesis_producer.block_signing_key,
            confirm_count: Vec::new(),
            activated_protocol_features: Arc::new(ProtocolFeatureActivationSet::new()),
            additional_signatures: Vec::new(),
        }
    }

    /// Get the timestamp of this state's block.
    pub fn timestamp(&self) -> BlockTimestamp {
        self.header.header.timestamp
    }

    /// Get the id of this state's predecessor block.
    pub fn previous(&self) -> BlockId {
        self.header.header.previous
    }

    /// Compute the DPOS irreversible block number implied by `producer_of_next_block` building on
    /// this state.
    ///
    /// This is the order statistic at index `(n - 1) / 3` (ascending) over the per-producer
    /// implied-irreversibility numbers, with `producer_of_next_block`'s entry replaced by the
    /// current proposed-irreversible number. In other words: the highest block number that more
    /// than two thirds of the producers' entries meet or exceed.
    pub fn calc_dpos_last_irreversible(&self, producer_of_next_block: &ProducerName) -> BlockNum {
        let mut blocknums: Vec<BlockNum> = self
            .producer_to_last_implied_irb
            .iter()
            .map(|(name, implied_irb)| {
                if name == producer_of_next_block {
                    self.dpos_proposed_irreversible_blocknum
                } else {
                    *implied_irb
                }
            })
            .collect();

        if blocknums.is_empty() {
            return BlockNum::new(0);
        }

        let index = (blocknums.len() - 1) / 3;
        let (_, nth, _) = blocknums.select_nth_unstable(index);
        *nth
    }

    /// Begin the transition to the next block on this branch.
    ///
    /// `when` must be strictly after this state's timestamp; the producer of the next block is
    /// determined by the active schedule at that slot. `confirmations_to_claim` is the number of
    /// prior unconfirmed blocks the producer confirms, which must not reach back over blocks the
    /// producer itself already confirmed.
    pub fn next(
        &self,
        when: BlockTimestamp,
        confirmations_to_claim: u16,
    ) -> Result<PendingBlockHeaderState, HeaderStateError> {
        if when <= self.timestamp() {
            return Err(HeaderStateError::InvalidTimestamp {
                when,
                current: self.timestamp(),
            });
        }

        let proauth = self.active_schedule.scheduled_producer(when).clone();
        let block_num = self.block_num + 1;
        let num_active_producers = self.active_schedule.len();
        let required_confs = (num_active_producers as u32 * 2 / 3 + 1) as u8;

        if let Some(last_produced) = self.producer_to_last_produced.get(&proauth.producer_name) {
            // The claim covers the `confirmations_to_claim` blocks right below the new one; none
            // of them may be a block this producer made itself.
            if last_produced.int() as i64
                >= block_num.int() as i64 - confirmations_to_claim as i64
            {
                return Err(HeaderStateError::DoubleConfirmation {
                    producer: proauth.producer_name.clone(),
                    last_produced: *last_produced,
                });
            }
        }

        // Roll the confirmation window forward: append a fresh counter for the new block
        // (dropping the oldest entry if the window is full), then burn one confirmation off the
        // most recent `confirmations_to_claim + 1` entries. An entry hitting zero makes its block
        // the new proposed-irreversible block, and everything at or before it leaves the window.
        let mut confirm_count: Vec<u8> =
            if self.confirm_count.len() < MAXIMUM_TRACKED_DPOS_CONFIRMATIONS {
                self.confirm_count.clone()
            } else {
                self.confirm_count[1..].to_vec()
            };
        confirm_count.push(required_confs);

        let mut new_dpos_proposed_irreversible_blocknum = self.dpos_proposed_irreversible_blocknum;
        let mut blocks_to_confirm = confirmations_to_claim as u32 + 1;
        let mut i = confirm_count.len();
        while i > 0 && blocks_to_confirm > 0 {
            confirm_count[i - 1] -= 1;
            if confirm_count[i - 1] == 0 {
                let block_num_for_i = block_num - (confirm_count.len() - i) as u32;
                new_dpos_proposed_irreversible_blocknum = block_num_for_i;
                confirm_count.drain(..i);
                break;
            }
            i -= 1;
            blocks_to_confirm -= 1;
        }

        let dpos_irreversible_blocknum = self.calc_dpos_last_irreversible(&proauth.producer_name);

        let mut blockroot_merkle = self.blockroot_merkle.clone();
        blockroot_merkle.append(Digest::new(self.id.bytes()));

        let mut result = PendingBlockHeaderState {
            block_num,
            previous: self.id,
            timestamp: when,
            confirmed: confirmations_to_claim,
            producer: proauth.producer_name.clone(),
            valid_block_signing_key: proauth.block_signing_key,
            active_schedule_version: self.active_schedule.version,
            dpos_proposed_irreversible_blocknum: new_dpos_proposed_irreversible_blocknum,
            dpos_irreversible_blocknum,
            active_schedule: Arc::clone(&self.active_schedule),
            blockroot_merkle,
            producer_to_last_produced: BTreeMap::new(),
            producer_to_last_implied_irb: BTreeMap::new(),
            confirm_count,
            prev_pending_schedule: self.pending_schedule.clone(),
            was_pending_promoted: false,
            prev_activated_protocol_features: Arc::clone(&self.activated_protocol_features),
        };

        let promoted_schedule: Option<Arc<ProducerSchedule>> = match &self.pending_schedule {
            Some(pending)
                if !pending.schedule.is_empty()
                    && dpos_irreversible_blocknum >= pending.schedule_lib_num =>
            {
                Some(Arc::clone(&pending.schedule))
            }
            _ => None,
        };

        if let Some(new_schedule) = promoted_schedule {
            // The proposed schedule's block is now irreversible: it becomes the active schedule
            // for this very block. Producers joining the schedule start their bookkeeping at the
            // irreversible block number; producers leaving it drop out of the maps.
            result.active_schedule_version = new_schedule.version;
            result.was_pending_promoted = true;

            for authority in &new_schedule.producers {
                let name = &authority.producer_name;
                let last_produced = if name == &proauth.producer_name {
                    result.block_num
                } else {
                    *self
                        .producer_to_last_produced
                        .get(name)
                        .unwrap_or(&dpos_irreversible_blocknum)
                };
                let implied_irb = if name == &proauth.producer_name {
                    self.dpos_proposed_irreversible_blocknum
                } else {
                    *self
                        .producer_to_last_implied_irb
                        .get(name)
                        .unwrap_or(&dpos_irreversible_blocknum)
                };
                result
                    .producer_to_last_produced
                    .insert(name.clone(), last_produced);
                result
                    .producer_to_last_implied_irb
                    .insert(name.clone(), implied_irb);
            }
            result.active_schedule = new_schedule;
        } else {
            result.producer_to_last_produced = self.producer_to_last_produced.clone();
            result
                .producer_to_last_produced
                .insert(proauth.producer_name.clone(), result.block_num);
            result.producer_to_last_implied_irb = self.producer_to_last_implied_irb.clone();
            result.producer_to_last_implied_irb.insert(
                proauth.producer_name.clone(),
                self.dpos_proposed_irreversible_blocknum,
            );
        }

        Ok(result)
    }

    /// Get the digest that the producer's signature must cover.
    ///
    /// Commits to the header, the merkle root over all prior block ids, and the hash of the
    /// pending schedule (or of the active schedule if none is pending).
    pub fn sig_digest(&self) -> Digest {
        let header_bmroot = sha256_pair(
            &self.header.header.digest(),
            &self.blockroot_merkle.root(),
        );
        let schedule_hash = match &self.pending_schedule {
            Some(pending) => pending.schedule_hash,
            None => self.active_schedule.digest(),
        };
        sha256_pair(&header_bmroot, &schedule_hash)
    }

    /// Verify that this state's producer signature was made by the scheduled producer's signing
    /// key over [`sig_digest`](Self::sig_digest).
    pub fn verify_signee(&self) -> Result<(), HeaderStateError> {
        let verifying_key = VerifyingKey::from_bytes(&self.valid_block_signing_key)
            .map_err(|_| HeaderStateError::InvalidSignature)?;
        let signature = Signature::from_bytes(&self.header.producer_signature.bytes());
        verifying_key
            .verify(&self.sig_digest().bytes(), &signature)
            .map_err(|_| HeaderStateError::InvalidSignature)
    }
}

/// The partially-derived state of the next block on a branch, between
/// [`next`](BlockHeaderState::next) and [`finish_next`](PendingBlockHeaderState::finish_next).
#[derive(Clone, Debug)]
pub struct PendingBlockHeaderState {
    pub block_num: BlockNum,
    pub previous: BlockId,
    pub timestamp: BlockTimestamp,
    pub confirmed: u16,
    pub producer: ProducerName,
    pub valid_block_signing_key: VerifyingKeyBytes,
    pub active_schedule_version: ScheduleVersion,
    pub dpos_proposed_irreversible_blocknum: BlockNum,
    pub dpos_irreversible_blocknum: BlockNum,
    pub active_schedule: Arc<ProducerSchedule>,
    pub blockroot_merkle: IncrementalMerkle,
    pub producer_to_last_produced: BTreeMap<ProducerName, BlockNum>,
    pub producer_to_last_implied_irb: BTreeMap<ProducerName, BlockNum>,
    pub confirm_count: Vec<u8>,
    pub prev_pending_schedule: Option<PendingSchedule>,
    pub was_pending_promoted: bool,
    pub prev_activated_protocol_features: Arc<ProtocolFeatureActivationSet>,
}

impl PendingBlockHeaderState {
    /// Build the header that [`finish_next`](Self::finish_next) will accept for this pending
    /// state, packing the given schedule change and feature activations into extensions.
    pub fn make_header(
        &self,
        transaction_mroot: Digest,
        action_mroot: Digest,
        new_producers: Option<ProducerSchedule>,
        new_protocol_feature_activations: Vec<Digest>,
    ) -> Result<BlockHeader, HeaderStateError> {
        let mut header_extensions = HeaderExtensions::new();
        if !new_protocol_feature_activations.is_empty() {
            let payload = ProtocolFeatureActivation {
                protocol_features: new_protocol_feature_activations,
            }
            .try_to_vec()
            .expect("extension serialization into a Vec never fails");
            header_extensions.emplace(PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID, payload)?;
        }
        if let Some(schedule) = new_producers {
            let payload = ProducerScheduleChange { schedule }
                .try_to_vec()
                .expect("extension serialization into a Vec never fails");
            header_extensions.emplace(PRODUCER_SCHEDULE_CHANGE_EXTENSION_ID, payload)?;
        }

        Ok(BlockHeader {
            timestamp: self.timestamp,
            producer: self.producer.clone(),
            confirmed: self.confirmed,
            previous: self.previous,
            transaction_mroot,
            action_mroot,
            schedule_version: self.active_schedule_version,
            header_extensions,
        })
    }

    /// Complete the transition: check `signed_header` against this pending state, interpret its
    /// extensions, and (unless `skip_validate_signee`) verify the producer signature.
    ///
    /// `validator` is invoked exactly once if the header activates protocol features, and not at
    /// all otherwise.
    pub fn finish_next<F: FeatureSet + ?Sized>(
        self,
        signed_header: SignedBlockHeader,
        additional_signatures: Vec<SignatureBytes>,
        feature_set: &F,
        validator: FeatureValidator,
        skip_validate_signee: bool,
    ) -> Result<BlockHeaderState, HeaderStateError> {
        let header = &signed_header.header;

        if header.timestamp != self.timestamp {
            return Err(HeaderStateError::HeaderMismatch { field: "timestamp" });
        }
        if header.previous != self.previous {
            return Err(HeaderStateError::HeaderMismatch { field: "previous" });
        }
        if header.confirmed != self.confirmed {
            return Err(HeaderStateError::HeaderMismatch { field: "confirmed" });
        }
        if header.producer != self.producer {
            return Err(HeaderStateError::HeaderMismatch { field: "producer" });
        }
        if header.schedule_version != self.active_schedule_version {
            return Err(HeaderStateError::HeaderMismatch {
                field: "schedule_version",
            });
        }

        header.header_extensions.validate()?;

        // Protocol feature activations.
        let mut new_protocol_features: Vec<Digest> = Vec::new();
        if let Some(payload) = header
            .header_extensions
            .get(PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID)
        {
            let activation = ProtocolFeatureActivation::try_from_slice(payload).map_err(|_| {
                HeaderStateError::from(ExtensionError::MalformedPayload {
                    id: PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID,
                })
            })?;
            new_protocol_features = activation.protocol_features;

            let mut last: Option<&Digest> = None;
            for feature in &new_protocol_features {
                if let Some(last) = last {
                    if last >= feature {
                        return Err(HeaderStateError::InvalidFeatureExtension {
                            reason: "activated feature digests must be strictly ascending"
                                .to_string(),
                        });
                    }
                }
                last = Some(feature);

                if !feature_set.is_recognized(feature) {
                    return Err(HeaderStateError::UnknownOrDuplicateFeature { feature: *feature });
                }
                if self.prev_activated_protocol_features.contains(feature) {
                    return Err(HeaderStateError::UnknownOrDuplicateFeature { feature: *feature });
                }
            }

            validator(
                self.timestamp,
                &self.prev_activated_protocol_features,
                &new_protocol_features,
            )
            .map_err(|err| HeaderStateError::InvalidFeatureExtension { reason: err.reason })?;
        }
        let activated_protocol_features = if new_protocol_features.is_empty() {
            Arc::clone(&self.prev_activated_protocol_features)
        } else {
            Arc::new(
                self.prev_activated_protocol_features
                    .extend(&new_protocol_features),
            )
        };

        // Producer schedule change.
        let pending_schedule: Option<PendingSchedule> = if let Some(payload) = header
            .header_extensions
            .get(PRODUCER_SCHEDULE_CHANGE_EXTENSION_ID)
        {
            let change = ProducerScheduleChange::try_from_slice(payload).map_err(|_| {
                HeaderStateError::from(ExtensionError::MalformedPayload {
                    id: PRODUCER_SCHEDULE_CHANGE_EXTENSION_ID,
                })
            })?;
            if self.was_pending_promoted {
                return Err(HeaderStateError::InvalidScheduleChange {
                    reason: "cannot propose a schedule in the block that promotes one".to_string(),
                });
            }
            if self.prev_pending_schedule.is_some() {
                return Err(HeaderStateError::InvalidScheduleChange {
                    reason: "a proposed schedule is already pending".to_string(),
                });
            }
            if change.schedule.version != self.active_schedule.version + 1 {
                return Err(HeaderStateError::InvalidScheduleChange {
                    reason: format!(
                        "proposed schedule version {} does not follow active version {}",
                        change.schedule.version, self.active_schedule.version
                    ),
                });
            }
            if change.schedule.is_empty() {
                return Err(HeaderStateError::InvalidScheduleChange {
                    reason: "proposed schedule has no producers".to_string(),
                });
            }
            Some(PendingSchedule::new(self.block_num, change.schedule))
        } else if self.was_pending_promoted {
            None
        } else {
            self.prev_pending_schedule.clone()
        };

        let id = header.calculate_id();

        let state = BlockHeaderState {
            id,
            block_num: self.block_num,
            header: signed_header,
            dpos_proposed_irreversible_blocknum: self.dpos_proposed_irreversible_blocknum,
            dpos_irreversible_blocknum: self.dpos_irreversible_blocknum,
            active_schedule: self.active_schedule,
            pending_schedule,
            blockroot_merkle: self.blockroot_merkle,
            producer_to_last_produced: self.producer_to_last_produced,
            producer_to_last_implied_irb: self.producer_to_last_implied_irb,
            valid_block_signing_key: self.valid_block_signing_key,
            confirm_count: self.confirm_count,
            activated_protocol_features,
            additional_signatures,
        };

        if !skip_validate_signee {
            state.verify_signee()?;
        }

        Ok(state)
    }

    /// Complete the transition as the block's producer: finish against an unsigned `header`,
    /// sign the resulting state's [`sig_digest`](BlockHeaderState::sig_digest) with `signer`,
    /// and verify the produced signature.
    pub fn finish_next_with_signer<F, S>(
        self,
        header: BlockHeader,
        feature_set: &F,
        validator: FeatureValidator,
        signer: S,
    ) -> Result<BlockHeaderState, HeaderStateError>
    where
        F: FeatureSet + ?Sized,
        S: FnOnce(&Digest) -> SignatureBytes,
    {
        let unsigned = SignedBlockHeader::new(header, SignatureBytes::default());
        let mut state = self.finish_next(unsigned, Vec::new(), feature_set, validator, true)?;
        state.header.producer_signature = signer(&state.sig_digest());
        state.verify_signee()?;
        Ok(state)
    }
}

/// Ways in which a header state transition can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum HeaderStateError {
    /// The claimed timestamp is not strictly after the current state's.
    InvalidTimestamp {
        when: BlockTimestamp,
        current: BlockTimestamp,
    },
    /// The producer's confirmation claim reaches back over blocks it already confirmed.
    DoubleConfirmation {
        producer: ProducerName,
        last_produced: BlockNum,
    },
    /// A header field disagrees with the pending state derived from its predecessor.
    HeaderMismatch { field: &'static str },
    /// The header's extension list or feature activation payload is malformed, or the feature
    /// validator rejected the activations.
    InvalidFeatureExtension { reason: String },
    /// A feature activation names a feature that is unrecognized or already active.
    UnknownOrDuplicateFeature { feature: Digest },
    /// A proposed schedule change is not allowed in this block.
    InvalidScheduleChange { reason: String },
    /// The producer signature does not verify under the scheduled producer's key.
    InvalidSignature,
}

impl Display for HeaderStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HeaderStateError::InvalidTimestamp { when, current } => write!(
                f,
                "block timestamp (slot {}) is not after the current state's (slot {})",
                when, current
            ),
            HeaderStateError::DoubleConfirmation {
                producer,
                last_produced,
            } => write!(
                f,
                "producer {} double-confirms blocks at or before its last produced block {}",
                producer, last_produced
            ),
            HeaderStateError::HeaderMismatch { field } => {
                write!(f, "header field '{}' does not match the pending state", field)
            }
            HeaderStateError::InvalidFeatureExtension { reason } => {
                write!(f, "invalid protocol feature activation: {}", reason)
            }
            HeaderStateError::UnknownOrDuplicateFeature { feature } => write!(
                f,
                "protocol feature {} is unrecognized or already activated",
                feature
            ),
            HeaderStateError::InvalidScheduleChange { reason } => {
                write!(f, "invalid producer schedule change: {}", reason)
            }
            HeaderStateError::InvalidSignature => {
                write!(f, "producer signature verification failed")
            }
        }
    }
}

impl From<ExtensionError> for HeaderStateError {
    fn from(error: ExtensionError) -> Self {
        HeaderStateError::InvalidFeatureExtension {
            reason: error.to_string(),
        }
    }
}

fn sha256_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left.bytes());
    hasher.update(right.bytes());
    Digest::new(hasher.finalize().into())
}
