//! A fork database for DPOS blockchains.
//!
//! In a DPOS chain, blocks near the tip are provisional: competing producers can extend
//! competing branches, and a node must track all of them until enough of the producer set has
//! built on one branch to make a prefix of it irreversible. This crate provides the two pieces
//! of machinery that problem needs:
//!
//! - [`header_state`]: the per-block validation state machine. A
//!   [`BlockHeaderState`](header_state::BlockHeaderState) carries the producer schedules, the
//!   DPOS confirmation bookkeeping, the merkle accumulator over prior block ids, and the
//!   activated protocol features, and transitions to the next block's state by validating its
//!   header.
//! - [`fork_db`]: the [`ForkDatabase`](fork_db::ForkDatabase), a tree of
//!   [`BlockState`](header_state::block_state::BlockState)s rooted at the last irreversible
//!   block, with head selection, branch queries, pruning, and crash-safe persistence.
//!
//! Transaction execution, networking, and resource accounting are out of scope: the controller
//! that owns the fork database plugs in through the
//! [`FeatureSet`](types::features::FeatureSet) trait, the
//! [`FeatureValidator`](types::features::FeatureValidator) callback, and ed25519 producer
//! signatures.

pub mod types;

pub mod header_state;

pub mod fork_db;

pub mod logging;
