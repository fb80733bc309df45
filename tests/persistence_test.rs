//! Tests of the fork database snapshot file: the close/open round trip and rejection of
//! corrupted files.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::LevelFilter;
use tempfile::tempdir;

use fork_db::fork_db::{
    ForkChoiceMode, ForkDatabase, ForkDatabaseConfig, ForkDbError, IncludeRoot,
};
use fork_db::types::data_types::{BlockTimestamp, Digest};
use fork_db::types::features::{FeatureValidationError, ProtocolFeatureActivationSet};

use common::chain::{accept_all, block_state, genesis_block_state, OpenFeatureSet, TestChain};
use common::logging::setup_logger;

const FORK_DB_FILENAME: &str = "fork_db.dat";

fn make_db(data_dir: &Path) -> ForkDatabase {
    ForkDatabase::new(
        ForkDatabaseConfig::builder()
            .data_dir(data_dir.to_path_buf())
            .fork_choice(ForkChoiceMode::LongestChain)
            .build(),
    )
}

/// Populate a fork database with two branches off a four-producer genesis, close it, and return
/// the interesting ids for later assertions.
fn write_populated_snapshot(data_dir: &Path) -> PopulatedSnapshot {
    let chain = TestChain::new(&["alice", "bob", "carol", "dave"]);
    let genesis = chain.genesis();

    let state_2 = chain.produce(&genesis, BlockTimestamp::new(12), 0);
    let state_3 = chain.produce(&state_2, BlockTimestamp::new(24), 0);
    let fork_2 = chain.produce_distinct(&genesis, BlockTimestamp::new(12), 0, 0xBB);

    let b2 = block_state(state_2);
    let b3 = block_state(state_3);
    let f2 = block_state(fork_2);

    let db = make_db(data_dir);
    db.reset_root(genesis_block_state(&chain));
    db.add(Arc::clone(&b2), false).unwrap();
    db.add(Arc::clone(&b3), false).unwrap();
    db.add(Arc::clone(&f2), false).unwrap();
    db.mark_validated(&b2.id()).unwrap();
    assert!(db.set_pending_finality_id(b2.id()));

    db.close().unwrap();
    assert!(db.root().is_none());
    assert_eq!(db.size(), 0);

    PopulatedSnapshot {
        genesis_id: genesis.id,
        b2_id: b2.id(),
        b3_id: b3.id(),
        fork_2_id: f2.id(),
    }
}

struct PopulatedSnapshot {
    genesis_id: fork_db::types::data_types::BlockId,
    b2_id: fork_db::types::data_types::BlockId,
    b3_id: fork_db::types::data_types::BlockId,
    fork_2_id: fork_db::types::data_types::BlockId,
}

#[test]
fn close_and_open_round_trip() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let snapshot = write_populated_snapshot(dir.path());
    let path = dir.path().join(FORK_DB_FILENAME);
    assert!(path.is_file());

    let db = make_db(dir.path());
    db.open(&accept_all).unwrap();

    // The snapshot file is consumed on a successful open.
    assert!(!path.exists());

    assert_eq!(db.root().unwrap().id(), snapshot.genesis_id);
    assert_eq!(db.size(), 3);
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), snapshot.b3_id);
    assert_eq!(db.pending_finality_id(), snapshot.b2_id);
    assert!(db.block_exists(&snapshot.fork_2_id));

    // Validated flags survive the round trip.
    assert!(db
        .get_block(&snapshot.b2_id, IncludeRoot::No)
        .unwrap()
        .is_validated());
    assert!(!db
        .get_block(&snapshot.b3_id, IncludeRoot::No)
        .unwrap()
        .is_validated());
    assert!(db.root().unwrap().is_validated());

    // The reopened database is fully operational.
    let branch = db.fetch_branch(&snapshot.b3_id, None);
    assert_eq!(branch.len(), 2);
}

#[test]
fn open_without_file_is_a_no_op() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path());
    db.open(&accept_all).unwrap();
    assert!(db.root().is_none());
    assert_eq!(db.size(), 0);
}

#[test]
fn close_without_root_writes_nothing() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path());
    db.close().unwrap();
    assert!(!dir.path().join(FORK_DB_FILENAME).exists());
}

#[test]
fn wrong_magic_is_rejected() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    write_populated_snapshot(dir.path());
    let path = dir.path().join(FORK_DB_FILENAME);

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let db = make_db(dir.path());
    let result = db.open(&accept_all);
    assert!(matches!(
        result,
        Err(ForkDbError::CorruptForkDatabase { .. })
    ));
    assert!(db.root().is_none());
    // The broken file is left in place for inspection.
    assert!(path.is_file());
}

#[test]
fn unsupported_version_is_rejected() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    write_populated_snapshot(dir.path());
    let path = dir.path().join(FORK_DB_FILENAME);

    let mut bytes = fs::read(&path).unwrap();
    bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let db = make_db(dir.path());
    assert!(matches!(
        db.open(&accept_all),
        Err(ForkDbError::CorruptForkDatabase { .. })
    ));
    assert!(db.root().is_none());
}

#[test]
fn truncated_file_is_rejected() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    write_populated_snapshot(dir.path());
    let path = dir.path().join(FORK_DB_FILENAME);

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let db = make_db(dir.path());
    assert!(matches!(
        db.open(&accept_all),
        Err(ForkDbError::CorruptForkDatabase { .. })
    ));
    assert!(db.root().is_none());
}

#[test]
fn trailing_garbage_is_rejected() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    write_populated_snapshot(dir.path());
    let path = dir.path().join(FORK_DB_FILENAME);

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    fs::write(&path, &bytes).unwrap();

    let db = make_db(dir.path());
    assert!(matches!(
        db.open(&accept_all),
        Err(ForkDbError::CorruptForkDatabase { .. })
    ));
    assert!(db.root().is_none());
}

#[test]
fn snapshot_blocks_are_revalidated_against_features() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let chain = TestChain::new(&["alpha"]);
    let genesis = chain.genesis();
    let state_2 = chain
        .try_produce(
            &genesis,
            BlockTimestamp::new(1),
            0,
            Digest::default(),
            None,
            vec![Digest::new([1u8; 32])],
            &OpenFeatureSet,
            &accept_all,
        )
        .unwrap();

    let db = make_db(dir.path());
    db.reset_root(genesis_block_state(&chain));
    db.add(block_state(state_2), false).unwrap();
    db.close().unwrap();

    // A validator that no longer accepts the persisted activation poisons the whole snapshot.
    let veto = |_when: BlockTimestamp,
                _activated: &ProtocolFeatureActivationSet,
                _new_features: &[Digest]|
     -> Result<(), FeatureValidationError> {
        Err(FeatureValidationError {
            reason: "withdrawn across restart".to_string(),
        })
    };
    let reopened = make_db(dir.path());
    assert!(matches!(
        reopened.open(&veto),
        Err(ForkDbError::CorruptForkDatabase { .. })
    ));
    assert!(reopened.root().is_none());

    // With an accepting validator the same snapshot loads fine.
    let reopened = make_db(dir.path());
    reopened.open(&accept_all).unwrap();
    assert_eq!(reopened.size(), 1);
}
