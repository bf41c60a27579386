//! # Contract State Store
//!
//! Per-contract key/value state with exclusive, all-or-nothing checkpoints.
//!
//! ## Model
//!
//! ```text
//! StateStore
//!   contracts: address -> RwLock<ContractSlot { version, entries }>
//!   open:      address -> checkpoint id     (at most one per address)
//!
//! Checkpoint<'store>
//!   overlay:   key -> Some(value) | None (deleted)
//! ```
//!
//! A checkpoint reads through its overlay to committed state and writes
//! only to the overlay. Other readers keep seeing committed values until
//! [`StateStore::commit`] applies the overlay under the slot's write lock,
//! so nobody ever observes half a commit. [`StateStore::rollback`] (or
//! simply dropping the checkpoint) throws the overlay away.
//!
//! Opening a checkpoint and writing directly to committed state both go
//! through the slot's write lock, in that order, before touching the
//! open-checkpoint table. That fixed lock order is what makes "one
//! checkpoint per address" and "no direct writes under a checkpoint" hold
//! under contention.
//!
//! ## Roots
//!
//! `state_root(address)` is a BLAKE3 Merkle root over the sorted entries of
//! one contract; `root_hash()` is a Merkle root over every contract's root,
//! sorted by address. Both use the canonical codec, so equal state gives
//! equal roots on every machine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::codec::{encode_value, CanonicalEncoder, EncodingError};
use crate::config::STATE_LEAF_CONTEXT;
use crate::crypto::hash::{domain_separated_hash, merkle_root};

/// Committed state of a single contract, keys in sorted order.
pub type ContractState = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StateError {
    /// A checkpoint is already open on this address. Returned to the
    /// caller as-is; the store never retries.
    #[error("checkpoint conflict on {address}: another checkpoint is open")]
    CheckpointConflict { address: String },

    /// The checkpoint was opened on a different store.
    #[error("checkpoint for {address} does not belong to this store")]
    ForeignCheckpoint { address: String },

    /// The value cannot be canonically encoded (e.g. it contains a float).
    #[error("value for key {key:?} cannot be stored: {source}")]
    Encoding {
        key: String,
        #[source]
        source: EncodingError,
    },

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// StateView
// ---------------------------------------------------------------------------

/// Read/write access to one contract's state.
///
/// This is the only surface contract code is allowed to touch.
pub trait StateView {
    /// The contract address this view is scoped to.
    fn address(&self) -> &str;

    fn get(&self, key: &str) -> Option<Value>;

    fn put(&mut self, key: &str, value: Value) -> Result<(), StateError>;

    fn delete(&mut self, key: &str) -> Result<(), StateError>;
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ContractSlot {
    version: u64,
    entries: ContractState,
}

/// Thread-safe contract state. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct StateStore {
    contracts: DashMap<String, Arc<RwLock<ContractSlot>>>,
    open: DashMap<String, u64>,
    next_checkpoint: AtomicU64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: &str) -> Option<Arc<RwLock<ContractSlot>>> {
        self.contracts.get(address).map(|s| Arc::clone(s.value()))
    }

    fn slot_or_create(&self, address: &str) -> Arc<RwLock<ContractSlot>> {
        Arc::clone(self.contracts.entry(address.to_string()).or_default().value())
    }

    /// Committed value of `key` for `address`.
    pub fn get(&self, address: &str, key: &str) -> Option<Value> {
        self.slot(address)?.read().entries.get(key).cloned()
    }

    /// Committed state of `address` (empty if unknown).
    pub fn entries(&self, address: &str) -> ContractState {
        self.slot(address)
            .map(|s| s.read().entries.clone())
            .unwrap_or_default()
    }

    /// Writes committed state directly.
    ///
    /// Fails with [`StateError::CheckpointConflict`] while a checkpoint is
    /// open on `address`.
    pub fn put(&self, address: &str, key: &str, value: Value) -> Result<(), StateError> {
        check_encodable(key, &value)?;
        let slot = self.slot_or_create(address);
        let mut state = slot.write();
        self.ensure_no_checkpoint(address)?;
        state.entries.insert(key.to_string(), value);
        state.version += 1;
        Ok(())
    }

    /// Deletes committed state directly. Same conflict rule as [`Self::put`].
    pub fn delete(&self, address: &str, key: &str) -> Result<(), StateError> {
        let Some(slot) = self.slot(address) else {
            return Ok(());
        };
        let mut state = slot.write();
        self.ensure_no_checkpoint(address)?;
        if state.entries.remove(key).is_some() {
            state.version += 1;
        }
        Ok(())
    }

    /// Number of commits applied to `address`. Zero if never written.
    pub fn version(&self, address: &str) -> u64 {
        self.slot(address).map(|s| s.read().version).unwrap_or(0)
    }

    /// `true` if `address` has any committed state.
    pub fn contains(&self, address: &str) -> bool {
        self.slot(address)
            .map(|s| !s.read().entries.is_empty())
            .unwrap_or(false)
    }

    /// Addresses with committed state, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .contracts
            .iter()
            .filter(|e| !e.value().read().entries.is_empty())
            .map(|e| e.key().clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// `true` while a checkpoint is open on `address`.
    pub fn has_open_checkpoint(&self, address: &str) -> bool {
        self.open.contains_key(address)
    }

    fn ensure_no_checkpoint(&self, address: &str) -> Result<(), StateError> {
        if self.open.contains_key(address) {
            tracing::warn!(address, "write refused: checkpoint open");
            return Err(StateError::CheckpointConflict {
                address: address.to_string(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Opens an exclusive checkpoint on `address`.
    ///
    /// # Errors
    ///
    /// [`StateError::CheckpointConflict`] if one is already open.
    pub fn checkpoint(&self, address: &str) -> Result<Checkpoint<'_>, StateError> {
        let slot = self.slot_or_create(address);
        let state = slot.write();

        let id = self.next_checkpoint.fetch_add(1, Ordering::Relaxed);
        match self.open.entry(address.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::warn!(address, "checkpoint conflict");
                return Err(StateError::CheckpointConflict {
                    address: address.to_string(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(id);
            }
        }

        tracing::debug!(address, checkpoint = id, version = state.version, "checkpoint opened");
        Ok(Checkpoint {
            store: self,
            address: address.to_string(),
            id,
            base_version: state.version,
            overlay: BTreeMap::new(),
            finished: false,
        })
    }

    /// Applies the checkpoint's writes atomically and returns the new
    /// version of the address.
    pub fn commit(&self, mut checkpoint: Checkpoint<'_>) -> Result<u64, StateError> {
        if !std::ptr::eq(self, checkpoint.store) {
            return Err(StateError::ForeignCheckpoint {
                address: checkpoint.address.clone(),
            });
        }

        let overlay = std::mem::take(&mut checkpoint.overlay);
        let writes = overlay.len();
        let slot = self.slot_or_create(&checkpoint.address);

        let version = {
            let mut state = slot.write();
            for (key, value) in overlay {
                match value {
                    Some(value) => {
                        state.entries.insert(key, value);
                    }
                    None => {
                        state.entries.remove(&key);
                    }
                }
            }
            state.version += 1;
            self.release(&checkpoint);
            state.version
        };
        checkpoint.finished = true;

        tracing::info!(
            address = %checkpoint.address,
            checkpoint = checkpoint.id,
            writes,
            version,
            "checkpoint committed"
        );
        Ok(version)
    }

    /// Discards the checkpoint. Committed state is exactly as it was when
    /// the checkpoint was opened.
    pub fn rollback(&self, mut checkpoint: Checkpoint<'_>) {
        checkpoint.overlay.clear();
        checkpoint.store.release(&checkpoint);
        checkpoint.finished = true;
        tracing::debug!(
            address = %checkpoint.address,
            checkpoint = checkpoint.id,
            "checkpoint rolled back"
        );
    }

    fn release(&self, checkpoint: &Checkpoint<'_>) {
        self.open
            .remove_if(&checkpoint.address, |_, id| *id == checkpoint.id);
    }

    // -----------------------------------------------------------------------
    // Roots
    // -----------------------------------------------------------------------

    /// Merkle root over the committed entries of `address`.
    ///
    /// An address with no state has the all-zero root.
    pub fn state_root(&self, address: &str) -> Result<[u8; 32], StateError> {
        match self.slot(address) {
            Some(slot) => contract_root(&slot.read().entries),
            None => Ok([0u8; 32]),
        }
    }

    /// Merkle root over every contract's `state_root`, ordered by address.
    pub fn root_hash(&self) -> Result<[u8; 32], StateError> {
        let mut leaves = Vec::new();
        for address in self.addresses() {
            let root = self.state_root(&address)?;
            let mut enc = CanonicalEncoder::new();
            enc.put_str(&address)
                .and_then(|e| e.put_bytes(&root))
                .map_err(|source| StateError::Encoding {
                    key: address.clone(),
                    source,
                })?;
            leaves.push(domain_separated_hash(STATE_LEAF_CONTEXT, &enc.finish()));
        }
        Ok(merkle_root(&leaves))
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Copy of all committed state. Open checkpoints are not included.
    pub fn snapshot(&self) -> StateSnapshot {
        let contracts = self
            .contracts
            .iter()
            .filter_map(|e| {
                let state = e.value().read();
                if state.entries.is_empty() && state.version == 0 {
                    return None;
                }
                Some((
                    e.key().clone(),
                    ContractSnapshot {
                        version: state.version,
                        entries: state.entries.clone(),
                    },
                ))
            })
            .collect();
        StateSnapshot { contracts }
    }

    /// Rebuilds a store from a snapshot.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Result<Self, StateError> {
        let store = Self::new();
        for (address, contract) in snapshot.contracts {
            for (key, value) in &contract.entries {
                check_encodable(key, value)?;
            }
            store.contracts.insert(
                address,
                Arc::new(RwLock::new(ContractSlot {
                    version: contract.version,
                    entries: contract.entries,
                })),
            );
        }
        Ok(store)
    }
}

fn check_encodable(key: &str, value: &Value) -> Result<(), StateError> {
    encode_value(value)
        .map(|_| ())
        .map_err(|source| StateError::Encoding {
            key: key.to_string(),
            source,
        })
}

fn contract_root(entries: &ContractState) -> Result<[u8; 32], StateError> {
    let mut leaves = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let mut enc = CanonicalEncoder::new();
        enc.put_str(key)
            .and_then(|e| e.put_value(value))
            .map_err(|source| StateError::Encoding {
                key: key.clone(),
                source,
            })?;
        leaves.push(domain_separated_hash(STATE_LEAF_CONTEXT, &enc.finish()));
    }
    Ok(merkle_root(&leaves))
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// An exclusive, uncommitted view of one contract's state.
///
/// Finish it with [`StateStore::commit`] or [`StateStore::rollback`].
/// Dropping it unfinished rolls back and logs a warning.
#[derive(Debug)]
pub struct Checkpoint<'a> {
    store: &'a StateStore,
    address: String,
    id: u64,
    base_version: u64,
    overlay: BTreeMap<String, Option<Value>>,
    finished: bool,
}

impl<'a> Checkpoint<'a> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Version of the address when the checkpoint was opened.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// `true` if anything was written or deleted.
    pub fn is_dirty(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Pending writes (`None` marks a delete).
    pub fn pending(&self) -> &BTreeMap<String, Option<Value>> {
        &self.overlay
    }
}

impl StateView for Checkpoint<'_> {
    fn address(&self) -> &str {
        &self.address
    }

    fn get(&self, key: &str) -> Option<Value> {
        match self.overlay.get(key) {
            Some(pending) => pending.clone(),
            None => self.store.get(&self.address, key),
        }
    }

    fn put(&mut self, key: &str, value: Value) -> Result<(), StateError> {
        check_encodable(key, &value)?;
        self.overlay.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StateError> {
        self.overlay.insert(key.to_string(), None);
        Ok(())
    }
}

impl Drop for Checkpoint<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                address = %self.address,
                checkpoint = self.id,
                pending = self.overlay.len(),
                "checkpoint dropped without commit, rolling back"
            );
            self.store.release(self);
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Serializable copy of a store's committed state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub contracts: BTreeMap<String, ContractSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub version: u64,
    pub entries: ContractState,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
