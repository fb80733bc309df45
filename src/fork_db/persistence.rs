//! On-disk snapshot format of the fork database.
//!
//! The file is a flat borsh stream:
//!
//! ```text
//! magic: u32            (0x464F524B)
//! version: u32          (within [MIN_SUPPORTED_VERSION, MAX_SUPPORTED_VERSION])
//! root: BlockState
//! head_id: BlockId
//! pending_finality_id: BlockId
//! count: u64
//! count x BlockState    (ascending (block_num, id), so predecessors come first)
//! ```
//!
//! Any deviation (wrong magic, unsupported version, a short read, or bytes left over after the
//! last record) is reported as [`ForkDbError::CorruptForkDatabase`]; the caller leaves the index
//! empty in that case.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::header_state::block_state::{BlockState, BlockStateBytes};
use crate::types::data_types::BlockId;

use super::ForkDbError;

pub(crate) const FORK_DB_MAGIC: u32 = 0x464F_524B;
pub(crate) const MIN_SUPPORTED_VERSION: u32 = 1;
pub(crate) const MAX_SUPPORTED_VERSION: u32 = 1;

/// Name of the snapshot file inside the configured data directory.
pub(crate) const FORK_DB_FILENAME: &str = "fork_db.dat";

/// The decoded contents of a snapshot file.
pub(crate) struct PersistedForkDb {
    pub(crate) root: BlockState,
    pub(crate) head_id: BlockId,
    pub(crate) pending_finality_id: BlockId,
    pub(crate) blocks: Vec<BlockState>,
}

pub(crate) fn read_fork_db_file(path: &Path) -> Result<PersistedForkDb, ForkDbError> {
    let buf = fs::read(path).map_err(|source| ForkDbError::Io { source })?;
    let mut remaining: &[u8] = &buf;

    let magic = u32::deserialize(&mut remaining).map_err(|_| corrupt("file too short"))?;
    if magic != FORK_DB_MAGIC {
        return Err(corrupt(&format!(
            "unexpected magic number {:#010x}",
            magic
        )));
    }
    let version = u32::deserialize(&mut remaining).map_err(|_| corrupt("file too short"))?;
    if !(MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&version) {
        return Err(corrupt(&format!(
            "unsupported version {} (supported: {} to {})",
            version, MIN_SUPPORTED_VERSION, MAX_SUPPORTED_VERSION
        )));
    }

    let root: BlockState = BlockStateBytes::deserialize(&mut remaining)
        .map_err(|_| corrupt("malformed root block state"))?
        .into();
    let head_id =
        BlockId::deserialize(&mut remaining).map_err(|_| corrupt("malformed head id"))?;
    let pending_finality_id = BlockId::deserialize(&mut remaining)
        .map_err(|_| corrupt("malformed pending finality id"))?;
    let count = u64::deserialize(&mut remaining).map_err(|_| corrupt("malformed block count"))?;

    let mut blocks = Vec::new();
    for record in 0..count {
        let block: BlockState = BlockStateBytes::deserialize(&mut remaining)
            .map_err(|_| corrupt(&format!("malformed block state record {}", record)))?
            .into();
        blocks.push(block);
    }

    if !remaining.is_empty() {
        return Err(corrupt(&format!(
            "{} trailing bytes after the last record",
            remaining.len()
        )));
    }

    Ok(PersistedForkDb {
        root,
        head_id,
        pending_finality_id,
        blocks,
    })
}

pub(crate) fn write_fork_db_file(
    path: &Path,
    root: &BlockState,
    head_id: BlockId,
    pending_finality_id: BlockId,
    blocks: &[Arc<BlockState>],
) -> Result<(), ForkDbError> {
    let mut buf: Vec<u8> = Vec::new();
    FORK_DB_MAGIC
        .serialize(&mut buf)
        .map_err(|source| ForkDbError::Io { source })?;
    MAX_SUPPORTED_VERSION
        .serialize(&mut buf)
        .map_err(|source| ForkDbError::Io { source })?;
    BlockStateBytes::from(root)
        .serialize(&mut buf)
        .map_err(|source| ForkDbError::Io { source })?;
    head_id
        .serialize(&mut buf)
        .map_err(|source| ForkDbError::Io { source })?;
    pending_finality_id
        .serialize(&mut buf)
        .map_err(|source| ForkDbError::Io { source })?;
    (blocks.len() as u64)
        .serialize(&mut buf)
        .map_err(|source| ForkDbError::Io { source })?;
    for block in blocks {
        BlockStateBytes::from(block.as_ref())
            .serialize(&mut buf)
            .map_err(|source| ForkDbError::Io { source })?;
    }
    fs::write(path, &buf).map_err(|source| ForkDbError::Io { source })
}

fn corrupt(reason: &str) -> ForkDbError {
    ForkDbError::CorruptForkDatabase {
        reason: reason.to_string(),
    }
}
