//! File-backed account store with optional encryption at rest.
//! Records live in a single per-store JSON file; when encryption is on,
//! the file holds AES-256-CBC ciphertext under a key persisted next to it.

pub mod codec;
mod fsio;
pub mod keys;
pub mod store;

pub use keys::{KeyManager, StoreKey};
pub use store::{AccountStore, StoreConfig};
