//! Block header extensions.
//!
//! Headers carry optional, typed payloads as an ordered list of `(extension id, bytes)` pairs.
//! Extension ids must be strictly ascending within a header, which also enforces uniqueness. Two
//! extension types are defined:
//! - id 0, [`ProtocolFeatureActivation`]: digests of protocol features activated by the block.
//! - id 1, [`ProducerScheduleChange`]: a proposed replacement producer schedule.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::{data_types::Digest, producer_schedule::ProducerSchedule};

/// Extension id of [`ProtocolFeatureActivation`].
pub const PROTOCOL_FEATURE_ACTIVATION_EXTENSION_ID: u16 = 0;

/// Extension id of [`ProducerScheduleChange`].
pub const PRODUCER_SCHEDULE_CHANGE_EXTENSION_ID: u16 = 1;

/// Ordered list of `(extension id, payload)` pairs carried by a block header.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct HeaderExtensions(Vec<(u16, Vec<u8>)>);

impl HeaderExtensions {
    /// Create an empty `HeaderExtensions`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extension with the given `id` and `payload`.
    ///
    /// Fails with [`ExtensionError::OutOfOrder`] if `id` is not strictly greater than the id of
    /// every extension already present.
    pub fn emplace(&mut self, id: u16, payload: Vec<u8>) -> Result<(), ExtensionError> {
        if let Some((last_id, _)) = self.0.last() {
            if *last_id >= id {
                return Err(ExtensionError::OutOfOrder { id });
            }
        }
        self.0.push((id, payload));
        Ok(())
    }

    /// Get the payload of the extension with the given `id`, if present.
    pub fn get(&self, id: u16) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(extension_id, _)| *extension_id == id)
            .map(|(_, payload)| payload.as_slice())
    }

    /// Check that extension ids are strictly ascending.
    ///
    /// Deserialized headers can contain arbitrary pairs, so this is re-checked on every received
    /// header before its extensions are interpreted.
    pub fn validate(&self) -> Result<(), ExtensionError> {
        let mut last_id: Option<u16> = None;
        for (id, _) in &self.0 {
            if let Some(last) = last_id {
                if last >= *id {
                    return Err(ExtensionError::OutOfOrder { id: *id });
                }
            }
            last_id = Some(*id);
        }
        Ok(())
    }

    /// Iterate through the `(id, payload)` pairs in this `HeaderExtensions`.
    pub fn iter(&self) -> std::slice::Iter<'_, (u16, Vec<u8>)> {
        self.0.iter()
    }

    /// Get how many extensions are in this `HeaderExtensions`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether this `HeaderExtensions` is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Payload of the extension that activates protocol features (extension id 0).
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ProtocolFeatureActivation {
    pub protocol_features: Vec<Digest>,
}

/// Payload of the extension that proposes a new producer schedule (extension id 1).
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ProducerScheduleChange {
    pub schedule: ProducerSchedule,
}

/// Ways in which a header's extension list can be malformed.
#[derive(Debug, PartialEq, Eq)]
pub enum ExtensionError {
    /// An extension id is not strictly greater than the ids before it.
    OutOfOrder { id: u16 },
    /// An extension payload failed to deserialize as its declared type.
    MalformedPayload { id: u16 },
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionError::OutOfOrder { id } => {
                write!(f, "header extension id {} is out of order or duplicated", id)
            }
            ExtensionError::MalformedPayload { id } => {
                write!(f, "payload of header extension id {} is malformed", id)
            }
        }
    }
}
