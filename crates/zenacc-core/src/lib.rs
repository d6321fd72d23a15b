//! Core contracts for Zenacc: account record types, loose predicate
//! matching, the error taxonomy, and the `AccountRecords` store contract.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod error;
pub mod matching;
pub mod records;

pub use error::StoreError;
pub use records::{
    run_for_accounts, Account, AccountRecords, Collection, InMemoryAccountRecords, ID_FIELD,
};
