//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Number of a block in a chain.
///
/// Starts at 1 for the genesis block and increases by 1 for every block, on every branch. Two
/// competing blocks on different branches can therefore share the same `BlockNum` while having
/// different [`BlockId`]s.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize,
    BorshSerialize,
)]
pub struct BlockNum(u32);

impl BlockNum {
    /// Create a new `BlockNum` with an `int` inner value.
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    /// Get the inner `u32` value of this `BlockNum`.
    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for BlockNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u32> for BlockNum {
    type Output = BlockNum;

    fn add(self, rhs: u32) -> Self::Output {
        BlockNum(self.0.add(rhs))
    }
}

impl Sub<u32> for BlockNum {
    type Output = BlockNum;

    fn sub(self, rhs: u32) -> Self::Output {
        BlockNum(self.0.sub(rhs))
    }
}

/// Identifier of a block.
///
/// A `BlockId` is the SHA256 hash of the block's serialized header, with the first 4 bytes
/// overwritten by the big-endian encoding of the block's number. This makes the block number
/// recoverable from the id alone through [`block_num`](Self::block_num), without consulting any
/// index.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockId([u8; 32]);

impl BlockId {
    /// Create a new `BlockId` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `BlockId`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Get the number of the block this `BlockId` identifies, read out of the id's first 4 bytes.
    pub fn block_num(&self) -> BlockNum {
        BlockNum::new(u32::from_be_bytes([
            self.0[0], self.0[1], self.0[2], self.0[3],
        ]))
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Time of a block, measured in 500-millisecond slots since the chain epoch.
///
/// Producer scheduling is a pure function of the slot (see
/// [`ProducerSchedule::scheduled_producer`](super::producer_schedule::ProducerSchedule::scheduled_producer)),
/// so two honest producers never contend for the same `BlockTimestamp`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize,
    BorshSerialize,
)]
pub struct BlockTimestamp(u32);

impl BlockTimestamp {
    /// Create a new `BlockTimestamp` at slot `slot`.
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// Get the slot number of this `BlockTimestamp`.
    pub const fn slot(&self) -> u32 {
        self.0
    }
}

impl Display for BlockTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u32> for BlockTimestamp {
    type Output = BlockTimestamp;

    fn add(self, rhs: u32) -> Self::Output {
        BlockTimestamp(self.0.add(rhs))
    }
}

/// Version number of a [`ProducerSchedule`](super::producer_schedule::ProducerSchedule).
///
/// Starts at an arbitrary value for the initial schedule and increases by exactly 1 for every
/// schedule change that gets promoted to active.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize,
    BorshSerialize,
)]
pub struct ScheduleVersion(u32);

impl ScheduleVersion {
    /// Create a new `ScheduleVersion` with an `int` inner value.
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    /// Get the inner `u32` value of this `ScheduleVersion`.
    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for ScheduleVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl AddAssign<u32> for ScheduleVersion {
    fn add_assign(&mut self, rhs: u32) {
        self.0.add_assign(rhs)
    }
}

impl Add<u32> for ScheduleVersion {
    type Output = ScheduleVersion;

    fn add(self, rhs: u32) -> Self::Output {
        ScheduleVersion(self.0.add(rhs))
    }
}

/// 32-byte cryptographic hash.
///
/// Within this crate, `Digest`s are always SHA256 hashes: header digests, merkle tree nodes,
/// schedule hashes and protocol feature identifiers.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Create a new `Digest` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `Digest`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ed25519 digital signature.
///
/// Within this crate, these are produced using the [`ed25519_dalek`] crate.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Default for SignatureBytes {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of a block producer.
///
/// Producer names are the identities that [`ProducerSchedule`](super::producer_schedule::ProducerSchedule)s
/// are made of, and the keys of the per-producer bookkeeping maps inside
/// [`BlockHeaderState`](crate::header_state::BlockHeaderState).
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ProducerName(String);

impl ProducerName {
    /// Create a new `ProducerName` wrapping `name`.
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Get the inner `str` value of this `ProducerName`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProducerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
