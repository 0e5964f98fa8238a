//! # In-Memory Storage
//!
//! In-memory [`AgreementStore`](concord_storage::AgreementStore) for
//! deterministic simulation testing (DST) and unit tests.
//!
//! Records go through the same SBOR encoding and key layout a durable
//! backend would use, so a restore from a `MemoryStore` exercises the full
//! decode path.

mod store;

pub use store::MemoryStore;
