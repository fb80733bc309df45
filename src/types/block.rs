//! Block headers and blocks.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest as Sha256Digest, Sha256};

use super::{
    data_types::{
        BlockId, BlockNum, BlockTimestamp, Digest, ProducerName, ScheduleVersion, SignatureBytes,
    },
    extensions::HeaderExtensions,
};

/// Header of a block.
///
/// A header pins down everything a validating node needs to re-derive the block's
/// [`BlockHeaderState`](crate::header_state::BlockHeaderState): its position in the chain
/// (`previous`, `timestamp`), the producer's identity and irreversibility claim (`producer`,
/// `confirmed`), commitments over the block's contents (`transaction_mroot`, `action_mroot`), and
/// any schedule or feature changes (`schedule_version`, `header_extensions`).
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockHeader {
    pub timestamp: BlockTimestamp,
    pub producer: ProducerName,

    /// How many of this producer's previously-unconfirmed ancestor blocks this block confirms.
    pub confirmed: u16,

    pub previous: BlockId,
    pub transaction_mroot: Digest,
    pub action_mroot: Digest,
    pub schedule_version: ScheduleVersion,
    pub header_extensions: HeaderExtensions,
}

impl BlockHeader {
    /// Get the number of the block this header belongs to: one more than its predecessor's.
    pub fn block_num(&self) -> BlockNum {
        self.previous.block_num() + 1
    }

    /// Get the SHA256 digest of this header's serialization.
    pub fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(
            self.try_to_vec()
                .expect("header serialization into a Vec never fails"),
        );
        Digest::new(hasher.finalize().into())
    }

    /// Compute the id of the block this header belongs to.
    ///
    /// The id is the header digest with the first 4 bytes overwritten by the big-endian block
    /// number, so [`BlockId::block_num`] can recover the number without any lookup.
    pub fn calculate_id(&self) -> BlockId {
        let mut bytes = self.digest().bytes();
        bytes[0..4].copy_from_slice(&self.block_num().int().to_be_bytes());
        BlockId::new(bytes)
    }
}

/// A [`BlockHeader`] together with the scheduled producer's signature over the block's signing
/// digest.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignedBlockHeader {
    pub header: BlockHeader,
    pub producer_signature: SignatureBytes,
}

impl SignedBlockHeader {
    /// Create a new `SignedBlockHeader` from `header` and `producer_signature`.
    pub fn new(header: BlockHeader, producer_signature: SignatureBytes) -> Self {
        Self {
            header,
            producer_signature,
        }
    }
}

/// A complete block: a signed header plus the serialized transactions it carries.
///
/// Transaction contents are opaque to the fork database; they ride along so that a fork switch can
/// hand the blocks of the adopted branch back to the controller for re-application.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignedBlock {
    pub signed_header: SignedBlockHeader,
    pub transactions: Vec<Vec<u8>>,
}

impl SignedBlock {
    /// Create a new `SignedBlock` from `signed_header` and `transactions`.
    pub fn new(signed_header: SignedBlockHeader, transactions: Vec<Vec<u8>>) -> Self {
        Self {
            signed_header,
            transactions,
        }
    }

    /// Get the header of this block.
    pub fn header(&self) -> &BlockHeader {
        &self.signed_header.header
    }
}
