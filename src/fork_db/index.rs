//! The in-memory index of block states underneath [`ForkDatabase`](super::ForkDatabase).
//!
//! `ForkIndex` is the unlocked core: a tree of [`BlockState`]s keyed by id, rooted at the last
//! irreversible block, with secondary lookups by predecessor id and by block number, and an
//! ordered set of fork-choice keys from which the best head is selected. All public access goes
//! through the mutex-holding facade in [`super`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::header_state::block_state::BlockState;
use crate::logging;
use crate::types::data_types::{BlockId, BlockNum};

use super::{AddResult, ForkChoiceMode, ForkDbError, IncludeRoot};

/// Ordering key of the fork-choice set: branches are preferred first by how much of them is
/// irreversible, then by length. The id breaks ties only to keep keys unique within the set.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ForkChoiceKey {
    dpos_irreversible_blocknum: BlockNum,
    block_num: BlockNum,
    id: BlockId,
}

impl ForkChoiceKey {
    fn of(block_state: &BlockState) -> Self {
        Self {
            dpos_irreversible_blocknum: block_state.dpos_irreversible_blocknum(),
            block_num: block_state.block_num(),
            id: block_state.id(),
        }
    }

    /// The part of the key that decides whether one branch tip is strictly preferred over
    /// another. The id is deliberately excluded: between equally-preferred tips, the incumbent
    /// head is kept.
    fn preference(&self) -> (BlockNum, BlockNum) {
        (self.dpos_irreversible_blocknum, self.block_num)
    }
}

pub(crate) struct ForkIndex {
    fork_choice: ForkChoiceMode,
    root: Option<Arc<BlockState>>,
    head_id: Option<BlockId>,
    pending_finality_id: BlockId,
    by_id: HashMap<BlockId, Arc<BlockState>>,
    by_prev: HashMap<BlockId, Vec<BlockId>>,
    by_num: BTreeMap<BlockNum, Vec<BlockId>>,
    best: BTreeSet<ForkChoiceKey>,
}

impl ForkIndex {
    pub(crate) fn new(fork_choice: ForkChoiceMode) -> Self {
        Self {
            fork_choice,
            root: None,
            head_id: None,
            pending_finality_id: BlockId::default(),
            by_id: HashMap::new(),
            by_prev: HashMap::new(),
            by_num: BTreeMap::new(),
            best: BTreeSet::new(),
        }
    }

    /// Discard the entire index and start over with `root` as the new root block state.
    pub(crate) fn reset_root(&mut self, root: Arc<BlockState>) {
        self.root = Some(root);
        self.head_id = None;
        self.pending_finality_id = BlockId::default();
        self.by_id.clear();
        self.by_prev.clear();
        self.by_num.clear();
        self.best.clear();
    }

    /// Discard everything, including the root.
    pub(crate) fn clear(&mut self) {
        self.root = None;
        self.head_id = None;
        self.pending_finality_id = BlockId::default();
        self.by_id.clear();
        self.by_prev.clear();
        self.by_num.clear();
        self.best.clear();
    }

    pub(crate) fn root(&self) -> Option<Arc<BlockState>> {
        self.root.clone()
    }

    pub(crate) fn head(&self, include_root: IncludeRoot) -> Option<Arc<BlockState>> {
        match self.head_id {
            Some(head_id) => self.by_id.get(&head_id).cloned(),
            None => match include_root {
                IncludeRoot::Yes => self.root.clone(),
                IncludeRoot::No => None,
            },
        }
    }

    pub(crate) fn get_block(
        &self,
        id: &BlockId,
        include_root: IncludeRoot,
    ) -> Option<Arc<BlockState>> {
        if let Some(block_state) = self.by_id.get(id) {
            return Some(Arc::clone(block_state));
        }
        if include_root == IncludeRoot::Yes {
            if let Some(root) = &self.root {
                if root.id() == *id {
                    return Some(Arc::clone(root));
                }
            }
        }
        None
    }

    pub(crate) fn block_exists(&self, id: &BlockId) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn size(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn pending_finality_id(&self) -> BlockId {
        self.pending_finality_id
    }

    /// Advance the pending finality pointer. The pointer is monotonic: `id` is only accepted if
    /// its block number is higher than the current pointer's. Returns whether it advanced.
    pub(crate) fn set_pending_finality_id(&mut self, id: BlockId) -> bool {
        if id.block_num() > self.pending_finality_id.block_num() {
            self.pending_finality_id = id;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_descendant_of_pending_finality(&self, id: &BlockId) -> bool {
        if self.pending_finality_id == BlockId::default() {
            return false;
        }
        *id == self.pending_finality_id || self.is_descendant_of(&self.pending_finality_id, id)
    }

    /// Insert `candidate` into the tree and re-evaluate the head.
    ///
    /// The candidate must link to a block already in the index (or to the root) at exactly the
    /// next block number. The returned [`AddResult`] tells the caller how the head moved: not at
    /// all (`Added`), forward along the same branch (`AppendedToHead`), or across to a different
    /// branch (`ForkSwitch`).
    pub(crate) fn add(
        &mut self,
        candidate: Arc<BlockState>,
        ignore_duplicate: bool,
    ) -> Result<AddResult, ForkDbError> {
        let root = self.root.as_ref().ok_or(ForkDbError::NoRoot)?;
        let root_id = root.id();
        let id = candidate.id();
        let previous = candidate.previous();

        if self.by_id.contains_key(&id) || id == root_id {
            if ignore_duplicate {
                return Ok(AddResult::Duplicate);
            }
            return Err(ForkDbError::DuplicateBlock { id });
        }

        let prev_block = self
            .get_block(&previous, IncludeRoot::Yes)
            .ok_or(ForkDbError::Unlinkable { id, previous })?;
        if candidate.block_num() != prev_block.block_num() + 1 {
            return Err(ForkDbError::Unlinkable { id, previous });
        }

        let prev_head_id = self.head_id.unwrap_or(root_id);
        let prev_head_preference = self
            .head_id
            .and_then(|head_id| self.by_id.get(&head_id))
            .map(|head| ForkChoiceKey::of(head).preference());

        self.by_id.insert(id, Arc::clone(&candidate));
        self.by_prev.entry(previous).or_default().push(id);
        self.by_num.entry(candidate.block_num()).or_default().push(id);
        self.best.insert(ForkChoiceKey::of(&candidate));

        let strictly_better = match prev_head_preference {
            Some(head_preference) => {
                ForkChoiceKey::of(&candidate).preference() > head_preference
            }
            None => true,
        };
        let result = if strictly_better && self.eligible_for_head(&id) {
            self.head_id = Some(id);
            if previous == prev_head_id {
                AddResult::AppendedToHead
            } else {
                AddResult::ForkSwitch
            }
        } else {
            AddResult::Added
        };

        logging::log_insert_block(&candidate, &result);
        if result == AddResult::ForkSwitch {
            logging::log_fork_switch(&id, candidate.block_num());
        }

        Ok(result)
    }

    /// Remove the block identified by `id` and every descendant of it. Returns how many blocks
    /// were removed (0 if `id` is not in the index).
    pub(crate) fn remove(&mut self, id: &BlockId) -> Result<usize, ForkDbError> {
        if let Some(root) = &self.root {
            if root.id() == *id {
                return Err(ForkDbError::CannotRemoveRoot { id: *id });
            }
        }
        let removed = self.remove_subtree(id);
        if removed > 0 {
            logging::log_remove_branch(id, removed);
        }
        self.refresh_head();
        Ok(removed)
    }

    /// Remove every block whose number is `num` or higher. Fails if that would include the root.
    pub(crate) fn remove_by_num(&mut self, num: BlockNum) -> Result<usize, ForkDbError> {
        if let Some(root) = &self.root {
            if num <= root.block_num() {
                return Err(ForkDbError::CannotRemoveRoot { id: root.id() });
            }
        }
        let ids: Vec<BlockId> = self
            .by_num
            .range(num..)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        for id in &ids {
            self.erase(id);
        }
        self.refresh_head();
        Ok(ids.len())
    }

    /// Make the block identified by `id` the new root, pruning everything that is not the new
    /// root or one of its descendants.
    ///
    /// The new root must be in the index, validated, and on the branch of the current head.
    pub(crate) fn advance_root(&mut self, id: &BlockId) -> Result<(), ForkDbError> {
        let old_root = self.root.clone().ok_or(ForkDbError::NoRoot)?;
        let old_root_id = old_root.id();
        if *id == old_root_id {
            return Ok(());
        }

        let new_root = self
            .by_id
            .get(id)
            .cloned()
            .ok_or(ForkDbError::NotFound { id: *id })?;
        if !new_root.is_validated() {
            return Err(ForkDbError::InvalidAdvanceRoot {
                id: *id,
                reason: "block has not been validated".to_string(),
            });
        }
        let head_id = self
            .head(IncludeRoot::Yes)
            .map(|head| head.id())
            .unwrap_or(old_root_id);
        if *id != head_id && !self.is_descendant_of(id, &head_id) {
            return Err(ForkDbError::InvalidAdvanceRoot {
                id: *id,
                reason: "block is not on the branch of the current head".to_string(),
            });
        }

        // The trunk being retired: the new root and its ancestors down to and including the old
        // root. Everything hanging off it, other than the new root's own subtree, gets pruned.
        let mut trunk = vec![*id];
        let mut cursor = new_root.previous();
        while cursor != old_root_id {
            let ancestor =
                self.by_id
                    .get(&cursor)
                    .ok_or_else(|| ForkDbError::InvalidAdvanceRoot {
                        id: *id,
                        reason: "block is not a descendant of the current root".to_string(),
                    })?;
            let previous = ancestor.previous();
            trunk.push(cursor);
            cursor = previous;
        }
        trunk.push(old_root_id);

        let mut pruned = 0usize;
        self.erase(id);
        for trunk_id in &trunk[1..] {
            let children: Vec<BlockId> = self.by_prev.get(trunk_id).cloned().unwrap_or_default();
            for child in children {
                pruned += self.remove_subtree(&child);
            }
            if self.erase(trunk_id) {
                pruned += 1;
            }
        }

        self.root = Some(new_root);
        self.refresh_head();
        logging::log_advance_root(id, pruned);
        Ok(())
    }

    /// Flag the block identified by `id` as fully applied.
    pub(crate) fn mark_validated(&mut self, id: &BlockId) -> Result<(), ForkDbError> {
        let block_state = self
            .get_block(id, IncludeRoot::Yes)
            .ok_or(ForkDbError::NotFound { id: *id })?;
        block_state.set_validated(true);
        Ok(())
    }

    /// Check whether `descendant` is reachable from `ancestor` through `previous` links.
    /// A block is not its own descendant.
    pub(crate) fn is_descendant_of(&self, ancestor: &BlockId, descendant: &BlockId) -> bool {
        let ancestor_num = ancestor.block_num();
        if ancestor_num >= descendant.block_num() {
            return false;
        }
        let mut cursor = *descendant;
        loop {
            let Some(block_state) = self.get_block(&cursor, IncludeRoot::Yes) else {
                return false;
            };
            let previous = block_state.previous();
            if previous == *ancestor {
                return true;
            }
            if previous.block_num() <= ancestor_num {
                return false;
            }
            cursor = previous;
        }
    }

    /// Get the branch from the block identified by `h` back towards the root (exclusive), tip
    /// first. Blocks with a number above `trim_after_block_num` are skipped.
    pub(crate) fn fetch_branch(
        &self,
        h: &BlockId,
        trim_after_block_num: Option<BlockNum>,
    ) -> Vec<Arc<BlockState>> {
        let trim = trim_after_block_num.unwrap_or(BlockNum::new(u32::MAX));
        let mut branch = Vec::new();
        let mut cursor = *h;
        while let Some(block_state) = self.by_id.get(&cursor) {
            if block_state.block_num() <= trim {
                branch.push(Arc::clone(block_state));
            }
            cursor = block_state.previous();
        }
        branch
    }

    /// Get the two divergent branch prefixes from `first` and `second` back to (and excluding)
    /// their closest common ancestor, each tip first.
    pub(crate) fn fetch_branch_from(
        &self,
        first: &BlockId,
        second: &BlockId,
    ) -> Result<(Vec<Arc<BlockState>>, Vec<Arc<BlockState>>), ForkDbError> {
        let mut first_branch = self
            .get_block(first, IncludeRoot::Yes)
            .ok_or(ForkDbError::NotFound { id: *first })?;
        let mut second_branch = self
            .get_block(second, IncludeRoot::Yes)
            .ok_or(ForkDbError::NotFound { id: *second })?;
        let mut result = (Vec::new(), Vec::new());

        while first_branch.block_num() > second_branch.block_num() {
            result.0.push(Arc::clone(&first_branch));
            let previous = first_branch.previous();
            first_branch = self
                .get_block(&previous, IncludeRoot::Yes)
                .ok_or(ForkDbError::NotFound { id: previous })?;
        }
        while second_branch.block_num() > first_branch.block_num() {
            result.1.push(Arc::clone(&second_branch));
            let previous = second_branch.previous();
            second_branch = self
                .get_block(&previous, IncludeRoot::Yes)
                .ok_or(ForkDbError::NotFound { id: previous })?;
        }
        while first_branch.previous() != second_branch.previous() {
            result.0.push(Arc::clone(&first_branch));
            result.1.push(Arc::clone(&second_branch));
            let first_previous = first_branch.previous();
            let second_previous = second_branch.previous();
            first_branch = self
                .get_block(&first_previous, IncludeRoot::Yes)
                .ok_or(ForkDbError::NotFound { id: first_previous })?;
            second_branch = self
                .get_block(&second_previous, IncludeRoot::Yes)
                .ok_or(ForkDbError::NotFound { id: second_previous })?;
        }
        if first_branch.id() != second_branch.id() {
            result.0.push(first_branch);
            result.1.push(second_branch);
        }

        Ok(result)
    }

    /// Find the block with number `block_num` on the branch ending at `h`.
    pub(crate) fn search_on_branch(
        &self,
        h: &BlockId,
        block_num: BlockNum,
        include_root: IncludeRoot,
    ) -> Option<Arc<BlockState>> {
        let mut cursor = *h;
        while let Some(block_state) = self.by_id.get(&cursor) {
            if block_state.block_num() == block_num {
                return Some(Arc::clone(block_state));
            }
            if block_state.block_num() < block_num {
                return None;
            }
            cursor = block_state.previous();
        }
        if include_root == IncludeRoot::Yes {
            if let Some(root) = &self.root {
                if root.id() == cursor && root.block_num() == block_num {
                    return Some(Arc::clone(root));
                }
            }
        }
        None
    }

    /// Get every block in the index in ascending `(block_num, id)` order. This order guarantees
    /// that every block's predecessor appears before it (or is the root).
    pub(crate) fn sorted_blocks(&self) -> Vec<Arc<BlockState>> {
        let mut blocks = Vec::with_capacity(self.by_id.len());
        for ids in self.by_num.values() {
            let mut ids = ids.clone();
            ids.sort();
            for id in ids {
                if let Some(block_state) = self.by_id.get(&id) {
                    blocks.push(Arc::clone(block_state));
                }
            }
        }
        blocks
    }

    /// Force the head pointer to `head_id`, which must be the root or a block in the index.
    /// Used when reloading a persisted fork database, so that the head survives a restart even
    /// when it was an arrival-order tie-winner.
    pub(crate) fn restore_head(&mut self, head_id: BlockId) -> Result<(), ForkDbError> {
        if let Some(root) = &self.root {
            if root.id() == head_id {
                self.head_id = None;
                return Ok(());
            }
        }
        if self.by_id.contains_key(&head_id) {
            self.head_id = Some(head_id);
            return Ok(());
        }
        Err(ForkDbError::NotFound { id: head_id })
    }

    fn eligible_for_head(&self, id: &BlockId) -> bool {
        match self.fork_choice {
            ForkChoiceMode::LongestChain => true,
            ForkChoiceMode::FinalityGated => {
                self.pending_finality_id == BlockId::default()
                    || self.is_descendant_of_pending_finality(id)
            }
        }
    }

    // Re-derive the head from the fork-choice set if the current head pointer is gone.
    fn refresh_head(&mut self) {
        let head_still_present = self
            .head_id
            .map(|head_id| self.by_id.contains_key(&head_id))
            .unwrap_or(false);
        if head_still_present {
            return;
        }
        let new_head = self
            .best
            .iter()
            .rev()
            .find(|key| self.eligible_for_head(&key.id))
            .map(|key| key.id);
        self.head_id = new_head;
    }

    // Remove the subtree rooted at `id` (inclusive), returning how many blocks were erased.
    fn remove_subtree(&mut self, id: &BlockId) -> usize {
        let mut queue = vec![*id];
        let mut index = 0;
        while index < queue.len() {
            if let Some(children) = self.by_prev.get(&queue[index]) {
                queue.extend(children.iter().copied());
            }
            index += 1;
        }
        let mut removed = 0;
        for id in &queue {
            if self.erase(id) {
                removed += 1;
            }
        }
        removed
    }

    // Remove a single block from every lookup structure. Returns whether it was present.
    fn erase(&mut self, id: &BlockId) -> bool {
        let Some(block_state) = self.by_id.remove(id) else {
            return false;
        };
        let previous = block_state.previous();
        let mut siblings_empty = false;
        if let Some(siblings) = self.by_prev.get_mut(&previous) {
            siblings.retain(|sibling| sibling != id);
            siblings_empty = siblings.is_empty();
        }
        if siblings_empty {
            self.by_prev.remove(&previous);
        }
        let block_num = block_state.block_num();
        let mut peers_empty = false;
        if let Some(peers) = self.by_num.get_mut(&block_num) {
            peers.retain(|peer| peer != id);
            peers_empty = peers.is_empty();
        }
        if peers_empty {
            self.by_num.remove(&block_num);
        }
        self.best.remove(&ForkChoiceKey::of(&block_state));
        if self.head_id == Some(*id) {
            self.head_id = None;
        }
        true
    }
}
