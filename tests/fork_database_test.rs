//! Tests of the fork database proper: insertion, fork choice, branch queries, pruning, and the
//! pending finality gate.

mod common;

use std::path::Path;
use std::sync::Arc;

use log::LevelFilter;
use tempfile::tempdir;

use fork_db::fork_db::{
    AddResult, ForkChoiceMode, ForkDatabase, ForkDatabaseConfig, ForkDbError, IncludeRoot,
};
use fork_db::header_state::block_state::BlockState;
use fork_db::header_state::BlockHeaderState;
use fork_db::types::data_types::{BlockNum, BlockTimestamp};

use common::chain::{block_state, genesis_block_state, TestChain};
use common::logging::setup_logger;

fn make_db(data_dir: &Path, fork_choice: ForkChoiceMode) -> ForkDatabase {
    ForkDatabase::new(
        ForkDatabaseConfig::builder()
            .data_dir(data_dir.to_path_buf())
            .fork_choice(fork_choice)
            .build(),
    )
}

/// Build two competing branches off the genesis block of a four-producer chain. With no
/// confirmations claimed, irreversibility stays at the genesis block, so fork choice degenerates
/// to branch length.
struct TwoBranches {
    chain: TestChain,
    genesis: BlockHeaderState,
    branch_a: Vec<Arc<BlockState>>,
    branch_b: Vec<Arc<BlockState>>,
}

impl TwoBranches {
    fn build(a_len: usize, b_len: usize) -> Self {
        let chain = TestChain::new(&["alice", "bob", "carol", "dave"]);
        let genesis = chain.genesis();

        let mut branch_a = Vec::new();
        let mut state = genesis.clone();
        for step in 0..a_len {
            state = chain.produce(&state, BlockTimestamp::new(12 * (step as u32 + 1)), 0);
            branch_a.push(block_state(state.clone()));
        }

        let mut branch_b = Vec::new();
        let mut state = genesis.clone();
        for step in 0..b_len {
            state =
                chain.produce_distinct(&state, BlockTimestamp::new(12 * (step as u32 + 1)), 0, 0xBB);
            branch_b.push(block_state(state.clone()));
        }

        Self {
            chain,
            genesis,
            branch_a,
            branch_b,
        }
    }
}

#[test]
fn add_and_head_tracking() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(2, 0);
    db.reset_root(genesis_block_state(&branches.chain));

    assert!(db.head(IncludeRoot::No).is_none());
    assert_eq!(
        db.head(IncludeRoot::Yes).unwrap().id(),
        branches.genesis.id
    );

    let b2 = &branches.branch_a[0];
    let b3 = &branches.branch_a[1];
    assert_eq!(
        db.add(Arc::clone(b2), false).unwrap(),
        AddResult::AppendedToHead
    );
    assert_eq!(
        db.add(Arc::clone(b3), false).unwrap(),
        AddResult::AppendedToHead
    );

    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), b3.id());
    assert_eq!(db.size(), 2);
    assert!(db.block_exists(&b2.id()));
    assert!(!db.block_exists(&branches.genesis.id));
    assert_eq!(
        db.get_block(&b2.id(), IncludeRoot::No).unwrap().id(),
        b2.id()
    );
    assert_eq!(
        db.get_block(&branches.genesis.id, IncludeRoot::Yes)
            .unwrap()
            .id(),
        branches.genesis.id
    );
    assert!(db.get_block(&branches.genesis.id, IncludeRoot::No).is_none());
}

#[test]
fn add_rejects_unrooted_duplicate_and_unlinkable() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(2, 0);
    let b2 = &branches.branch_a[0];
    let b3 = &branches.branch_a[1];

    // No root yet.
    assert!(matches!(
        db.add(Arc::clone(b2), false),
        Err(ForkDbError::NoRoot)
    ));

    db.reset_root(genesis_block_state(&branches.chain));

    // Block 3 does not link while block 2 is absent.
    assert!(matches!(
        db.add(Arc::clone(b3), false),
        Err(ForkDbError::Unlinkable { .. })
    ));

    db.add(Arc::clone(b2), false).unwrap();
    assert!(matches!(
        db.add(Arc::clone(b2), false),
        Err(ForkDbError::DuplicateBlock { .. })
    ));
    assert_eq!(
        db.add(Arc::clone(b2), true).unwrap(),
        AddResult::Duplicate
    );
    assert_eq!(db.size(), 1);
}

#[test]
fn equal_branch_does_not_displace_head() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 4);
    db.reset_root(genesis_block_state(&branches.chain));

    for block in &branches.branch_a {
        db.add(Arc::clone(block), false).unwrap();
    }
    let head_a = branches.branch_a.last().unwrap();
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), head_a.id());

    // The competing branch catches up to the same length; the incumbent head stays.
    for block in &branches.branch_b[..3] {
        assert_eq!(db.add(Arc::clone(block), false).unwrap(), AddResult::Added);
    }
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), head_a.id());

    // One block longer, and the head switches branches.
    let b5 = &branches.branch_b[3];
    assert_eq!(
        db.add(Arc::clone(b5), false).unwrap(),
        AddResult::ForkSwitch
    );
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), b5.id());
}

#[test]
fn fetch_branch_and_search() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 0);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in &branches.branch_a {
        db.add(Arc::clone(block), false).unwrap();
    }
    let [b2, b3, b4] = [
        &branches.branch_a[0],
        &branches.branch_a[1],
        &branches.branch_a[2],
    ];

    // Tip first, back to but excluding the root.
    let branch = db.fetch_branch(&b4.id(), None);
    let branch_ids: Vec<_> = branch.iter().map(|block| block.id()).collect();
    assert_eq!(branch_ids, vec![b4.id(), b3.id(), b2.id()]);

    // Trimming skips blocks numbered above the cutoff.
    let trimmed = db.fetch_branch(&b4.id(), Some(BlockNum::new(3)));
    let trimmed_ids: Vec<_> = trimmed.iter().map(|block| block.id()).collect();
    assert_eq!(trimmed_ids, vec![b3.id(), b2.id()]);

    let from_head = db.fetch_branch_from_head(None);
    assert_eq!(from_head.len(), 3);
    assert_eq!(from_head[0].id(), b4.id());

    assert_eq!(
        db.search_on_branch(&b4.id(), BlockNum::new(3), IncludeRoot::No)
            .unwrap()
            .id(),
        b3.id()
    );
    assert_eq!(
        db.search_on_branch(&b4.id(), BlockNum::new(1), IncludeRoot::Yes)
            .unwrap()
            .id(),
        branches.genesis.id
    );
    assert!(db
        .search_on_branch(&b4.id(), BlockNum::new(1), IncludeRoot::No)
        .is_none());
    assert!(db
        .search_on_branch(&b4.id(), BlockNum::new(9), IncludeRoot::No)
        .is_none());
    assert_eq!(
        db.search_on_head_branch(BlockNum::new(2), IncludeRoot::No)
            .unwrap()
            .id(),
        b2.id()
    );

    assert!(db.is_descendant_of(&branches.genesis.id, &b4.id()));
    assert!(db.is_descendant_of(&b2.id(), &b4.id()));
    assert!(!db.is_descendant_of(&b4.id(), &b2.id()));
    assert!(!db.is_descendant_of(&b2.id(), &b2.id()));
}

#[test]
fn fetch_branch_from_finds_divergence() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 4);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in branches.branch_a.iter().chain(branches.branch_b.iter()) {
        db.add(Arc::clone(block), false).unwrap();
    }
    let a4 = &branches.branch_a[2];
    let b5 = &branches.branch_b[3];

    let (first, second) = db.fetch_branch_from(&a4.id(), &b5.id()).unwrap();
    let first_ids: Vec<_> = first.iter().map(|block| block.id()).collect();
    let second_ids: Vec<_> = second.iter().map(|block| block.id()).collect();
    assert_eq!(
        first_ids,
        vec![
            branches.branch_a[2].id(),
            branches.branch_a[1].id(),
            branches.branch_a[0].id(),
        ]
    );
    assert_eq!(
        second_ids,
        vec![
            branches.branch_b[3].id(),
            branches.branch_b[2].id(),
            branches.branch_b[1].id(),
            branches.branch_b[0].id(),
        ]
    );

    // Two ends of the same branch diverge only on the longer side.
    let (first, second) = db
        .fetch_branch_from(&branches.branch_a[0].id(), &a4.id())
        .unwrap();
    assert!(first.is_empty());
    assert_eq!(second.len(), 2);

    let unknown = branches.branch_b[3].id();
    db.remove(&unknown).unwrap();
    assert!(matches!(
        db.fetch_branch_from(&a4.id(), &unknown),
        Err(ForkDbError::NotFound { .. })
    ));
}

#[test]
fn remove_prunes_descendants() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 0);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in &branches.branch_a {
        db.add(Arc::clone(block), false).unwrap();
    }
    let [b2, b3, b4] = [
        &branches.branch_a[0],
        &branches.branch_a[1],
        &branches.branch_a[2],
    ];

    db.remove(&b3.id()).unwrap();
    assert_eq!(db.size(), 1);
    assert!(!db.block_exists(&b3.id()));
    assert!(!db.block_exists(&b4.id()));
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), b2.id());

    // Removing an unknown block is a no-op; removing the root is an error.
    db.remove(&b4.id()).unwrap();
    assert!(matches!(
        db.remove(&branches.genesis.id),
        Err(ForkDbError::CannotRemoveRoot { .. })
    ));
}

#[test]
fn remove_by_num_prunes_from_number_up() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 2);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in branches.branch_a.iter().chain(branches.branch_b.iter()) {
        db.add(Arc::clone(block), false).unwrap();
    }
    assert_eq!(db.size(), 5);

    // Removes blocks 3 and up on every branch.
    db.remove_by_num(BlockNum::new(3)).unwrap();
    assert_eq!(db.size(), 2);
    assert!(db.block_exists(&branches.branch_a[0].id()));
    assert!(db.block_exists(&branches.branch_b[0].id()));
    assert!(!db.block_exists(&branches.branch_a[1].id()));

    assert!(matches!(
        db.remove_by_num(BlockNum::new(1)),
        Err(ForkDbError::CannotRemoveRoot { .. })
    ));
}

#[test]
fn advance_root_prunes_other_branches() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 4);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in branches.branch_a.iter().chain(branches.branch_b.iter()) {
        db.add(Arc::clone(block), false).unwrap();
    }
    let b2 = &branches.branch_b[0];
    let b5 = &branches.branch_b[3];
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), b5.id());

    // Only validated blocks can become the root.
    assert!(matches!(
        db.advance_root(&b2.id()),
        Err(ForkDbError::InvalidAdvanceRoot { .. })
    ));
    db.mark_validated(&b2.id()).unwrap();

    db.advance_root(&b2.id()).unwrap();
    assert_eq!(db.root().unwrap().id(), b2.id());
    assert_eq!(db.size(), 3);
    for block in &branches.branch_a {
        assert!(!db.block_exists(&block.id()));
    }
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), b5.id());
    let branch = db.fetch_branch(&b5.id(), None);
    assert_eq!(branch.len(), 3);

    // Advancing to the current root is a no-op.
    db.advance_root(&b2.id()).unwrap();
    assert_eq!(db.root().unwrap().id(), b2.id());
}

#[test]
fn advance_root_requires_head_branch() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 2);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in branches.branch_a.iter().chain(branches.branch_b.iter()) {
        db.add(Arc::clone(block), false).unwrap();
    }

    // Branch A holds the head; a validated block on branch B still cannot become the root.
    let b2 = &branches.branch_b[0];
    db.mark_validated(&b2.id()).unwrap();
    assert!(matches!(
        db.advance_root(&b2.id()),
        Err(ForkDbError::InvalidAdvanceRoot { .. })
    ));

    let unknown = branches.branch_b[1].id();
    db.remove(&unknown).unwrap();
    assert!(matches!(
        db.advance_root(&unknown),
        Err(ForkDbError::NotFound { .. })
    ));
}

#[test]
fn mark_validated_requires_known_block() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(1, 0);
    db.reset_root(genesis_block_state(&branches.chain));
    let b2 = &branches.branch_a[0];

    assert!(matches!(
        db.mark_validated(&b2.id()),
        Err(ForkDbError::NotFound { .. })
    ));
    db.add(Arc::clone(b2), false).unwrap();
    assert!(!b2.is_validated());
    db.mark_validated(&b2.id()).unwrap();
    assert!(db.get_block(&b2.id(), IncludeRoot::No).unwrap().is_validated());
}

#[test]
fn pending_finality_pointer_is_monotonic() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::LongestChain);
    let branches = TwoBranches::build(3, 0);
    db.reset_root(genesis_block_state(&branches.chain));
    for block in &branches.branch_a {
        db.add(Arc::clone(block), false).unwrap();
    }
    let [b2, b3, b4] = [
        &branches.branch_a[0],
        &branches.branch_a[1],
        &branches.branch_a[2],
    ];

    assert!(!db.is_descendant_of_pending_finality(&b4.id()));

    assert!(db.set_pending_finality_id(b3.id()));
    assert_eq!(db.pending_finality_id(), b3.id());

    // The pointer never moves backwards.
    assert!(!db.set_pending_finality_id(b2.id()));
    assert_eq!(db.pending_finality_id(), b3.id());

    assert!(db.is_descendant_of_pending_finality(&b3.id()));
    assert!(db.is_descendant_of_pending_finality(&b4.id()));
    assert!(!db.is_descendant_of_pending_finality(&b2.id()));

    assert!(db.set_pending_finality_id(b4.id()));
    assert_eq!(db.pending_finality_id(), b4.id());
}

#[test]
fn finality_gated_head_ignores_other_branches() {
    setup_logger(LevelFilter::Trace);

    let dir = tempdir().unwrap();
    let db = make_db(dir.path(), ForkChoiceMode::FinalityGated);
    let branches = TwoBranches::build(4, 4);
    db.reset_root(genesis_block_state(&branches.chain));

    // Grow branch A to length 3 and point pending finality at its second block.
    for block in &branches.branch_a[..3] {
        db.add(Arc::clone(block), false).unwrap();
    }
    let a2 = &branches.branch_a[0];
    let a4 = &branches.branch_a[2];
    assert!(db.set_pending_finality_id(a2.id()));
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), a4.id());

    // Branch B overtakes branch A in length, but it does not descend from the pending finality
    // block, so the head stays put.
    for block in &branches.branch_b {
        assert_eq!(db.add(Arc::clone(block), false).unwrap(), AddResult::Added);
    }
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), a4.id());

    // A descendant of the pending finality block still extends the head.
    let a5 = &branches.branch_a[3];
    assert_eq!(
        db.add(Arc::clone(a5), false).unwrap(),
        AddResult::AppendedToHead
    );
    assert_eq!(db.head(IncludeRoot::No).unwrap().id(), a5.id());
}
