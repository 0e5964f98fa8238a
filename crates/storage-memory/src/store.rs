//! # Memory Store
//!
//! A byte-keyed ordered map behind a `parking_lot::RwLock`. All trait
//! methods take `&self`, so a store can be shared with `Arc` and outlive the
//! node that writes to it, which is how simulated crashes keep their state.

use concord_storage::{
    decode_record, encode_record, keys, AgreementStore, Decision, StorageError,
};
use concord_types::{AgreementCheckpoint, Round};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory agreement storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Every decision on record, in round order.
    pub fn decisions(&self) -> Result<Vec<Decision>, StorageError> {
        let data = self.data.read();
        let end = keys::next_prefix(keys::DECISION_PREFIX).unwrap_or_default();
        data.range(keys::DECISION_PREFIX.to_vec()..end)
            .map(|(_, bytes)| decode_record("decision", bytes))
            .collect()
    }
}

impl AgreementStore for MemoryStore {
    fn put_checkpoint(&self, checkpoint: &AgreementCheckpoint) -> Result<(), StorageError> {
        let bytes = encode_record("checkpoint", checkpoint)?;
        tracing::trace!(
            position = %checkpoint.position,
            bytes = bytes.len(),
            "Writing checkpoint"
        );
        self.data
            .write()
            .insert(keys::CHECKPOINT_KEY.to_vec(), bytes);
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<Option<AgreementCheckpoint>, StorageError> {
        self.data
            .read()
            .get(keys::CHECKPOINT_KEY)
            .map(|bytes| decode_record("checkpoint", bytes))
            .transpose()
    }

    fn put_decision(&self, decision: &Decision) -> Result<(), StorageError> {
        let key = keys::decision_key(decision.round);
        let mut data = self.data.write();

        if let Some(bytes) = data.get(&key) {
            let stored: Decision = decode_record("decision", bytes)?;
            if stored.value() == decision.value() {
                return Ok(());
            }
            return Err(StorageError::ConflictingDecision {
                round: decision.round,
                stored: stored.value(),
                attempted: decision.value(),
            });
        }

        data.insert(key, encode_record("decision", decision)?);
        Ok(())
    }

    fn get_decision(&self, round: Round) -> Result<Option<Decision>, StorageError> {
        self.data
            .read()
            .get(&keys::decision_key(round))
            .map(|bytes| decode_record("decision", bytes))
            .transpose()
    }

    fn latest_decided_round(&self) -> Result<Option<Round>, StorageError> {
        let data = self.data.read();
        let end = keys::next_prefix(keys::DECISION_PREFIX).unwrap_or_default();
        Ok(data
            .range(keys::DECISION_PREFIX.to_vec()..end)
            .next_back()
            .and_then(|(key, _)| keys::round_from_decision_key(key)))
    }
}
