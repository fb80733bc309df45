//! Functions that log out fork database events.
//!
//! Events are logged through the [log](https://docs.rs/log/latest/log/) crate. To get these
//! messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values). The first two values are always:
//! 1. The name of the event in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. Block ids are abbreviated to
//! the first seven characters of their Base64 encoding. For example, the following snippet is
//! how an insertion that switched forks is printed:
//!
//! ```text
//! InsertBlock, 1701329264, fNGCJyk, 42, ForkSwitch
//! ForkSwitch, 1701329264, fNGCJyk, 42
//! ```

use std::path::Path;
use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::fork_db::AddResult;
use crate::header_state::block_state::BlockState;
use crate::types::data_types::{BlockId, BlockNum};

// Names of each event in PascalCase for printing:
pub const INSERT_BLOCK: &str = "InsertBlock";
pub const FORK_SWITCH: &str = "ForkSwitch";
pub const REMOVE_BRANCH: &str = "RemoveBranch";
pub const ADVANCE_ROOT: &str = "AdvanceRoot";
pub const OPEN_FORK_DB: &str = "OpenForkDb";
pub const CLOSE_FORK_DB: &str = "CloseForkDb";

pub(crate) fn log_insert_block(block_state: &BlockState, result: &AddResult) {
    log::info!(
        "{}, {}, {}, {}, {:?}",
        INSERT_BLOCK,
        secs_since_unix_epoch(SystemTime::now()),
        first_seven_base64_chars(&block_state.id().bytes()),
        block_state.block_num(),
        result
    )
}

pub(crate) fn log_fork_switch(new_head: &BlockId, block_num: BlockNum) {
    log::info!(
        "{}, {}, {}, {}",
        FORK_SWITCH,
        secs_since_unix_epoch(SystemTime::now()),
        first_seven_base64_chars(&new_head.bytes()),
        block_num
    )
}

pub(crate) fn log_remove_branch(id: &BlockId, removed: usize) {
    log::info!(
        "{}, {}, {}, {}",
        REMOVE_BRANCH,
        secs_since_unix_epoch(SystemTime::now()),
        first_seven_base64_chars(&id.bytes()),
        removed
    )
}

pub(crate) fn log_advance_root(id: &BlockId, pruned: usize) {
    log::info!(
        "{}, {}, {}, {}",
        ADVANCE_ROOT,
        secs_since_unix_epoch(SystemTime::now()),
        first_seven_base64_chars(&id.bytes()),
        pruned
    )
}

pub(crate) fn log_open(path: &Path, blocks: usize) {
    log::info!(
        "{}, {}, {}, {}",
        OPEN_FORK_DB,
        secs_since_unix_epoch(SystemTime::now()),
        path.display(),
        blocks
    )
}

pub(crate) fn log_close(path: &Path, blocks: usize) {
    log::info!(
        "{}, {}, {}, {}",
        CLOSE_FORK_DB,
        secs_since_unix_epoch(SystemTime::now()),
        path.display(),
        blocks
    )
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
