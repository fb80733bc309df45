//! Producer schedules: the rotating sets of identities authorized to sign blocks.
//!
//! A [`ProducerSchedule`] is an immutable snapshot. Schedule changes never mutate a schedule in
//! place: a proposed change travels through a block header as a
//! [`ProducerScheduleChange`](super::extensions::ProducerScheduleChange) extension, sits in a
//! [`PendingSchedule`] until the block that carried it becomes irreversible, and is then promoted
//! wholesale to active. Block header states on different branches share schedule snapshots through
//! `Arc`s.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest as Sha256Digest, Sha256};

use super::data_types::{BlockNum, BlockTimestamp, Digest, ProducerName, ScheduleVersion};

/// How many consecutive slots each producer occupies before the schedule rotates to the next one.
pub const PRODUCER_REPETITIONS: u32 = 12;

/// Ed25519 public key in serialized form.
pub type VerifyingKeyBytes = [u8; 32];

/// A single producer's entry in a [`ProducerSchedule`]: its name and the key its block signatures
/// must verify under.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ProducerAuthority {
    pub producer_name: ProducerName,
    pub block_signing_key: VerifyingKeyBytes,
}

/// Versioned, ordered set of [`ProducerAuthority`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ProducerSchedule {
    pub version: ScheduleVersion,
    pub producers: Vec<ProducerAuthority>,
}

impl ProducerSchedule {
    /// Create a new `ProducerSchedule` with the given `version` and `producers`.
    pub fn new(version: ScheduleVersion, producers: Vec<ProducerAuthority>) -> Self {
        Self { version, producers }
    }

    /// Get the producer scheduled to sign the block at timestamp `when`.
    ///
    /// Scheduling is round-robin over the schedule's producers in order, each producer holding
    /// [`PRODUCER_REPETITIONS`] consecutive slots.
    ///
    /// # Panics
    ///
    /// Panics if the schedule is empty. Schedules carried by header states are never empty.
    pub fn scheduled_producer(&self, when: BlockTimestamp) -> &ProducerAuthority {
        let index = when.slot() % (self.producers.len() as u32 * PRODUCER_REPETITIONS)
            / PRODUCER_REPETITIONS;
        &self.producers[index as usize]
    }

    /// Get the [`ProducerAuthority`] named `name`, if it is in this schedule.
    pub fn get_producer(&self, name: &ProducerName) -> Option<&ProducerAuthority> {
        self.producers
            .iter()
            .find(|authority| &authority.producer_name == name)
    }

    /// Check whether a producer named `name` is in this schedule.
    pub fn contains(&self, name: &ProducerName) -> bool {
        self.get_producer(name).is_some()
    }

    /// Get how many producers are in this schedule.
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Check whether this schedule has no producers.
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Get the SHA256 digest of this schedule's serialization. This digest is folded into the
    /// block signing digest, committing every signature to the schedule it was produced under.
    pub fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(
            self.try_to_vec()
                .expect("schedule serialization into a Vec never fails"),
        );
        Digest::new(hasher.finalize().into())
    }
}

/// A proposed producer schedule waiting to become active.
///
/// The schedule was carried by the block numbered `schedule_lib_num`; it is promoted by the first
/// state transition whose DPOS irreversible block number reaches that number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSchedule {
    pub schedule_lib_num: BlockNum,
    pub schedule_hash: Digest,
    pub schedule: Arc<ProducerSchedule>,
}

impl PendingSchedule {
    /// Create a new `PendingSchedule` for `schedule`, proposed in block `schedule_lib_num`.
    pub fn new(schedule_lib_num: BlockNum, schedule: ProducerSchedule) -> Self {
        let schedule_hash = schedule.digest();
        Self {
            schedule_lib_num,
            schedule_hash,
            schedule: Arc::new(schedule),
        }
    }
}
