//! The Fork Database: the tree of recent, potentially-reversible blocks.
//!
//! [`ForkDatabase`] tracks every block between the last irreversible block (the *root*) and the
//! tips of all known branches, selects the best branch tip (the *head*), and persists itself
//! across restarts as a single snapshot file. It is the authority on which branch a node
//! considers canonical; applying and reverting the blocks it hands out is the surrounding
//! controller's job.
//!
//! All state lives behind one mutex. Every public method acquires it for the duration of the
//! call and returns `Arc` clones of block states, so readers never observe a partially-updated
//! tree.

pub(crate) mod index;

pub(crate) mod persistence;

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use borsh::BorshDeserialize;
use typed_builder::TypedBuilder;

use crate::header_state::block_state::BlockState;
use crate::logging;
use crate::types::{
    data_types::{BlockId, BlockNum},
    extensions::{ProtocolFeatureActivation, PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID},
    features::FeatureValidator,
};

use index::ForkIndex;

/// How [`ForkDatabase::add`] affected the head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddResult {
    /// The block was already in the fork database; nothing changed.
    Duplicate,
    /// The block was inserted, but the head did not move.
    Added,
    /// The block was inserted and extended the head's branch; it is the new head.
    AppendedToHead,
    /// The block was inserted and made a different branch the best one; it is the new head.
    ForkSwitch,
}

/// Whether a lookup may resolve to the root block, or only to blocks in the index proper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeRoot {
    Yes,
    No,
}

/// The rule used to pick the head among competing branches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForkChoiceMode {
    /// Best branch by `(dpos irreversible block number, block number)`; between equally-good
    /// tips the incumbent head is kept.
    #[default]
    LongestChain,
    /// Same ordering, but a branch tip can only become head if it descends from the pending
    /// finality block (once one has been set).
    FinalityGated,
}

/// Configuration of a [`ForkDatabase`].
#[derive(Clone, Debug, TypedBuilder)]
pub struct ForkDatabaseConfig {
    /// Directory the snapshot file is read from and written to.
    pub data_dir: PathBuf,

    #[builder(default)]
    pub fork_choice: ForkChoiceMode,
}

/// Ways in which a fork database operation can fail.
#[derive(Debug)]
pub enum ForkDbError {
    /// The fork database has no root yet; call [`ForkDatabase::reset_root`] first.
    NoRoot,
    /// The block does not link to any block in the fork database.
    Unlinkable { id: BlockId, previous: BlockId },
    /// The block is already in the fork database.
    DuplicateBlock { id: BlockId },
    /// No block with this id is in the fork database.
    NotFound { id: BlockId },
    /// Removing this block would remove the root.
    CannotRemoveRoot { id: BlockId },
    /// The block cannot become the new root.
    InvalidAdvanceRoot { id: BlockId, reason: String },
    /// The snapshot file is unreadable; the fork database was left empty.
    CorruptForkDatabase { reason: String },
    /// Reading or writing the snapshot file failed.
    Io { source: std::io::Error },
}

impl Display for ForkDbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ForkDbError::NoRoot => write!(f, "the fork database has no root"),
            ForkDbError::Unlinkable { id, previous } => write!(
                f,
                "block {} does not link to any known block (previous: {})",
                id, previous
            ),
            ForkDbError::DuplicateBlock { id } => {
                write!(f, "block {} is already in the fork database", id)
            }
            ForkDbError::NotFound { id } => {
                write!(f, "block {} is not in the fork database", id)
            }
            ForkDbError::CannotRemoveRoot { id } => {
                write!(f, "removing block {} would remove the root", id)
            }
            ForkDbError::InvalidAdvanceRoot { id, reason } => {
                write!(f, "block {} cannot become the new root: {}", id, reason)
            }
            ForkDbError::CorruptForkDatabase { reason } => {
                write!(f, "corrupt fork database file: {}", reason)
            }
            ForkDbError::Io { source } => {
                write!(f, "fork database file i/o failed: {}", source)
            }
        }
    }
}

impl From<std::io::Error> for ForkDbError {
    fn from(source: std::io::Error) -> Self {
        ForkDbError::Io { source }
    }
}

/// The fork database. See the [module-level docs](self).
pub struct ForkDatabase {
    config: ForkDatabaseConfig,
    inner: Mutex<ForkIndex>,
}

impl ForkDatabase {
    /// Create an empty `ForkDatabase`. No file i/o happens until [`open`](Self::open) or
    /// [`close`](Self::close) is called.
    pub fn new(config: ForkDatabaseConfig) -> Self {
        let fork_choice = config.fork_choice;
        Self {
            config,
            inner: Mutex::new(ForkIndex::new(fork_choice)),
        }
    }

    /// Load the snapshot file from the configured data directory, if one exists.
    ///
    /// Every loaded block that activates protocol features is re-checked through `validator`,
    /// since the recognized feature set may have changed across the restart. On success the
    /// snapshot file is deleted, so a later crash cannot replay a stale snapshot. On any failure
    /// the index is left empty.
    pub fn open(&self, validator: FeatureValidator) -> Result<(), ForkDbError> {
        let path = self.config.data_dir.join(persistence::FORK_DB_FILENAME);
        if !path.is_file() {
            return Ok(());
        }

        let persisted = persistence::read_fork_db_file(&path)?;
        let block_count = persisted.blocks.len();

        let mut index = ForkIndex::new(self.config.fork_choice);
        index.reset_root(Arc::new(persisted.root));
        index.set_pending_finality_id(persisted.pending_finality_id);

        for block in persisted.blocks {
            let block = Arc::new(block);
            validate_loaded_features(&index, &block, validator)?;
            index
                .add(block, false)
                .map_err(|err| ForkDbError::CorruptForkDatabase {
                    reason: format!("block state record cannot be re-added: {}", err),
                })?;
        }
        index.restore_head(persisted.head_id).map_err(|_| {
            ForkDbError::CorruptForkDatabase {
                reason: "recorded head is not in the fork database".to_string(),
            }
        })?;

        *self.lock() = index;
        fs::remove_file(&path)?;
        logging::log_open(&path, block_count);
        Ok(())
    }

    /// Write the snapshot file to the configured data directory and clear the index.
    ///
    /// A fork database that was never given a root writes nothing.
    pub fn close(&self) -> Result<(), ForkDbError> {
        let mut guard = self.lock();
        let Some(root) = guard.root() else {
            return Ok(());
        };
        let head_id = guard
            .head(IncludeRoot::Yes)
            .map(|head| head.id())
            .unwrap_or_else(|| root.id());
        let blocks = guard.sorted_blocks();
        let path = self.config.data_dir.join(persistence::FORK_DB_FILENAME);
        persistence::write_fork_db_file(
            &path,
            &root,
            head_id,
            guard.pending_finality_id(),
            &blocks,
        )?;
        guard.clear();
        logging::log_close(&path, blocks.len());
        Ok(())
    }

    /// Discard the entire index and start over with `root` as the root block state.
    pub fn reset_root(&self, root: BlockState) {
        self.lock().reset_root(Arc::new(root));
    }

    /// Get the root block state, if a root has been set.
    pub fn root(&self) -> Option<Arc<BlockState>> {
        self.lock().root()
    }

    /// Get the head block state: the tip of the currently-best branch.
    pub fn head(&self, include_root: IncludeRoot) -> Option<Arc<BlockState>> {
        self.lock().head(include_root)
    }

    /// Insert a block state. See [`AddResult`] for how the head can move in response.
    pub fn add(
        &self,
        block_state: Arc<BlockState>,
        ignore_duplicate: bool,
    ) -> Result<AddResult, ForkDbError> {
        self.lock().add(block_state, ignore_duplicate)
    }

    /// Get the block state identified by `id`.
    pub fn get_block(&self, id: &BlockId, include_root: IncludeRoot) -> Option<Arc<BlockState>> {
        self.lock().get_block(id, include_root)
    }

    /// Check whether a block with this id is in the index (the root does not count).
    pub fn block_exists(&self, id: &BlockId) -> bool {
        self.lock().block_exists(id)
    }

    /// Get how many blocks are in the index, excluding the root.
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// Remove the block identified by `id` and all of its descendants.
    pub fn remove(&self, id: &BlockId) -> Result<(), ForkDbError> {
        self.lock().remove(id).map(|_| ())
    }

    /// Remove every block whose number is `num` or higher.
    pub fn remove_by_num(&self, num: BlockNum) -> Result<(), ForkDbError> {
        self.lock().remove_by_num(num).map(|_| ())
    }

    /// Make the block identified by `id` the new root, pruning every block that is neither the
    /// new root nor one of its descendants.
    pub fn advance_root(&self, id: &BlockId) -> Result<(), ForkDbError> {
        self.lock().advance_root(id)
    }

    /// Flag the block identified by `id` as fully applied, making it eligible to become the
    /// root.
    pub fn mark_validated(&self, id: &BlockId) -> Result<(), ForkDbError> {
        self.lock().mark_validated(id)
    }

    /// Check whether `descendant` is reachable from `ancestor` through `previous` links.
    pub fn is_descendant_of(&self, ancestor: &BlockId, descendant: &BlockId) -> bool {
        self.lock().is_descendant_of(ancestor, descendant)
    }

    /// Get the branch ending at the block identified by `h`, tip first, back to but excluding
    /// the root. Blocks numbered above `trim_after_block_num` are skipped.
    pub fn fetch_branch(
        &self,
        h: &BlockId,
        trim_after_block_num: Option<BlockNum>,
    ) -> Vec<Arc<BlockState>> {
        self.lock().fetch_branch(h, trim_after_block_num)
    }

    /// [`fetch_branch`](Self::fetch_branch) starting from the current head.
    pub fn fetch_branch_from_head(
        &self,
        trim_after_block_num: Option<BlockNum>,
    ) -> Vec<Arc<BlockState>> {
        let guard = self.lock();
        match guard.head(IncludeRoot::No) {
            Some(head) => guard.fetch_branch(&head.id(), trim_after_block_num),
            None => Vec::new(),
        }
    }

    /// Get the divergent prefixes of the branches ending at `first` and `second`, each tip
    /// first, excluding their closest common ancestor.
    pub fn fetch_branch_from(
        &self,
        first: &BlockId,
        second: &BlockId,
    ) -> Result<(Vec<Arc<BlockState>>, Vec<Arc<BlockState>>), ForkDbError> {
        self.lock().fetch_branch_from(first, second)
    }

    /// Find the block numbered `block_num` on the branch ending at `h`.
    pub fn search_on_branch(
        &self,
        h: &BlockId,
        block_num: BlockNum,
        include_root: IncludeRoot,
    ) -> Option<Arc<BlockState>> {
        self.lock().search_on_branch(h, block_num, include_root)
    }

    /// [`search_on_branch`](Self::search_on_branch) starting from the current head.
    pub fn search_on_head_branch(
        &self,
        block_num: BlockNum,
        include_root: IncludeRoot,
    ) -> Option<Arc<BlockState>> {
        let guard = self.lock();
        match guard.head(IncludeRoot::Yes) {
            Some(head) => guard.search_on_branch(&head.id(), block_num, include_root),
            None => None,
        }
    }

    /// Get the pending finality block id (the zero id if none has been set).
    pub fn pending_finality_id(&self) -> BlockId {
        self.lock().pending_finality_id()
    }

    /// Advance the pending finality pointer to `id`. The pointer only moves to blocks with a
    /// higher number than the current pointer's; returns whether it moved.
    pub fn set_pending_finality_id(&self, id: BlockId) -> bool {
        self.lock().set_pending_finality_id(id)
    }

    /// Check whether the block identified by `id` descends from (or is) the pending finality
    /// block. Always false while no pending finality id has been set.
    pub fn is_descendant_of_pending_finality(&self, id: &BlockId) -> bool {
        self.lock().is_descendant_of_pending_finality(id)
    }

    fn lock(&self) -> MutexGuard<'_, ForkIndex> {
        self.inner
            .lock()
            .expect("a thread panicked while holding the fork database lock")
    }
}

// Re-run the feature validator over a block loaded from a snapshot, against its parent's
// activated feature set.
fn validate_loaded_features(
    index: &ForkIndex,
    block: &BlockState,
    validator: FeatureValidator,
) -> Result<(), ForkDbError> {
    let header = &block.signed_header().header;
    let Some(payload) = header
        .header_extensions
        .get(PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID)
    else {
        return Ok(());
    };
    let activation = ProtocolFeatureActivation::try_from_slice(payload).map_err(|_| {
        ForkDbError::CorruptForkDatabase {
            reason: "malformed protocol feature activation in block state record".to_string(),
        }
    })?;
    // The parent is present for well-formed snapshots: records are written predecessors-first.
    let Some(parent) = index.get_block(&block.previous(), IncludeRoot::Yes) else {
        return Ok(());
    };
    validator(
        header.timestamp,
        &parent.header_state().activated_protocol_features,
        &activation.protocol_features,
    )
    .map_err(|err| ForkDbError::CorruptForkDatabase {
        reason: format!(
            "block state record is incompatible with the recognized protocol features: {}",
            err
        ),
    })
}
