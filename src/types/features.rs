//! Protocol feature activation plumbing.
//!
//! The fork database does not know what protocol features *do*; it only tracks which ones each
//! branch has activated. The surrounding controller supplies the two seams defined here:
//! - a [`FeatureSet`], which answers whether a feature digest names a feature the node recognizes,
//!   and
//! - a [`FeatureValidator`] callback, invoked exactly once per state transition that activates
//!   features, letting the controller veto activations it considers invalid in context.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{BlockTimestamp, Digest};

/// The set of protocol features activated on a branch, up to and including a particular block.
///
/// Activation sets are immutable snapshots shared between header states through `Arc`s; a block
/// that activates features gets a fresh set built by [`extend`](Self::extend).
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ProtocolFeatureActivationSet {
    protocol_features: BTreeSet<Digest>,
}

impl ProtocolFeatureActivationSet {
    /// Create an empty `ProtocolFeatureActivationSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the activation set that extends `self` with `additional` features.
    pub fn extend(&self, additional: &[Digest]) -> Self {
        let mut protocol_features = self.protocol_features.clone();
        protocol_features.extend(additional.iter().copied());
        Self { protocol_features }
    }

    /// Check whether `feature` has been activated.
    pub fn contains(&self, feature: &Digest) -> bool {
        self.protocol_features.contains(feature)
    }

    /// Iterate through the activated feature digests in ascending order.
    pub fn iter(&self) -> std::collections::btree_set::Iter<'_, Digest> {
        self.protocol_features.iter()
    }

    /// Get how many features have been activated.
    pub fn len(&self) -> usize {
        self.protocol_features.len()
    }

    /// Check whether no features have been activated.
    pub fn is_empty(&self) -> bool {
        self.protocol_features.is_empty()
    }
}

/// The set of protocol features a node recognizes.
///
/// Implemented by the controller that owns the fork database. A header state transition rejects
/// activation of any feature digest the `FeatureSet` does not recognize.
pub trait FeatureSet {
    /// Check whether `feature` names a protocol feature this node knows about.
    fn is_recognized(&self, feature: &Digest) -> bool;
}

/// Callback invoked when a state transition activates protocol features.
///
/// Arguments are the timestamp of the activating block, the features already activated on the
/// branch, and the newly activated feature digests. Returning an error rejects the block.
pub type FeatureValidator<'a> = &'a dyn Fn(
    BlockTimestamp,
    &ProtocolFeatureActivationSet,
    &[Digest],
) -> Result<(), FeatureValidationError>;

/// A [`FeatureValidator`] rejected a set of feature activations.
#[derive(Debug, PartialEq, Eq)]
pub struct FeatureValidationError {
    pub reason: String,
}

impl Display for FeatureValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "protocol feature validation failed: {}", self.reason)
    }
}
