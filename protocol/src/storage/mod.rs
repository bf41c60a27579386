//! # Storage
//!
//! Contract state lives here. The ledger of UTXOs itself is owned by the
//! embedding node; this crate only needs somewhere to keep per-contract
//! key/value state that can be checkpointed, committed and rolled back.
//!
//! ```text
//! state.rs: StateStore, Checkpoint, StateView, snapshots and roots
//! ```
//!
//! ## Design Decisions
//!
//! 1. **BLAKE3 for roots.** Same as everywhere else state is hashed. Leaves
//!    are domain-separated so a state leaf can never be confused with a
//!    contract address.
//!
//! 2. **JSON snapshots.** State values are arbitrary JSON documents, which
//!    rules out the compact binary formats that cannot round-trip
//!    self-describing data. Snapshots are for persistence and debugging,
//!    not hashing; hashing always goes through the canonical codec.

pub mod state;

pub use state::{
    Checkpoint, ContractSnapshot, ContractState, StateError, StateSnapshot, StateStore, StateView,
};
