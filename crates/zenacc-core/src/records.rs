use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::matching::matches_predicate;

/// Field holding the system-assigned record id. Immutable once assigned.
pub const ID_FIELD: &str = "id";

/// One account record: arbitrary caller-defined fields plus [`ID_FIELD`].
pub type Account = serde_json::Map<String, Value>;

/// The full record set of one store, keyed by id in insertion order.
pub type Collection = serde_json::Map<String, Value>;

/// Generate a fresh record id: a random 128-bit value as 32 hex characters.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Contract for an account record store. Implemented by the file-backed
/// store and by [`InMemoryAccountRecords`] for host tests.
///
/// Every operation observes the whole collection: implementations reload
/// state per call rather than caching between calls.
#[async_trait]
pub trait AccountRecords: Send + Sync {
    /// Insert a new account, assigning a fresh unique id (any id supplied
    /// in `fields` is overwritten). Returns the assigned id.
    async fn add_account(&self, fields: Account) -> Result<String, StoreError>;

    /// Fetch one account by id.
    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// First account, in insertion order, whose fields loosely match every
    /// field of `predicate`.
    async fn get_from_object(&self, predicate: &Account) -> Result<Option<Account>, StoreError>;

    /// All accounts matching `predicate`, in insertion order.
    async fn get_many_from_object(&self, predicate: &Account) -> Result<Vec<Account>, StoreError>;

    /// Overwrite fields of an existing account with `patch` (shallow; the
    /// `id` field in the patch is ignored). Missing id is an error.
    async fn modify_account(&self, id: &str, patch: Account) -> Result<(), StoreError>;

    /// Delete an account permanently. Missing id is an error.
    async fn remove_account(&self, id: &str) -> Result<(), StoreError>;

    /// The raw decoded collection.
    async fn accounts(&self) -> Result<Collection, StoreError>;
}

/// Apply a function to each of `accounts`; when it returns a patch, the
/// patch is persisted via [`AccountRecords::modify_account`] for that
/// account's id. Built for bulk conditional updates over query results:
///
/// ```no_run
/// # async fn demo(store: &impl zenacc_core::AccountRecords) -> Result<(), zenacc_core::StoreError> {
/// # use serde_json::Value;
/// let stale = store.get_many_from_object(&Default::default()).await?;
/// zenacc_core::run_for_accounts(store, &stale, |account| {
///     let mut patch = account.clone();
///     patch.insert("active".into(), Value::Bool(false));
///     Some(patch)
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_for_accounts<S, F>(
    store: &S,
    accounts: &[Account],
    mut apply: F,
) -> Result<(), StoreError>
where
    S: AccountRecords + ?Sized,
    F: FnMut(&Account) -> Option<Account>,
{
    for account in accounts {
        let Some(patch) = apply(account) else {
            continue;
        };
        match account.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => store.modify_account(id, patch).await?,
            None => warn!("skipping account without an id field"),
        }
    }
    Ok(())
}

/// In-memory implementation for host unit tests and ephemeral sessions.
/// Shares the matching and id semantics of the file-backed store but
/// persists nothing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountRecords {
    inner: Arc<Mutex<Collection>>,
}

impl InMemoryAccountRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collection>, StoreError> {
        self.inner
            .lock()
            .map_err(|err| StoreError::io(format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl AccountRecords for InMemoryAccountRecords {
    async fn add_account(&self, mut fields: Account) -> Result<String, StoreError> {
        let mut accounts = self.lock()?;
        let mut id = new_record_id();
        while accounts.contains_key(&id) {
            id = new_record_id();
        }
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        accounts.insert(id.clone(), Value::Object(fields));
        Ok(id)
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.lock()?;
        Ok(accounts.get(id).and_then(Value::as_object).cloned())
    }

    async fn get_from_object(&self, predicate: &Account) -> Result<Option<Account>, StoreError> {
        let accounts = self.lock()?;
        Ok(accounts
            .values()
            .filter_map(Value::as_object)
            .find(|account| matches_predicate(account, predicate))
            .cloned())
    }

    async fn get_many_from_object(&self, predicate: &Account) -> Result<Vec<Account>, StoreError> {
        let accounts = self.lock()?;
        Ok(accounts
            .values()
            .filter_map(Value::as_object)
            .filter(|account| matches_predicate(account, predicate))
            .cloned()
            .collect())
    }

    async fn modify_account(&self, id: &str, mut patch: Account) -> Result<(), StoreError> {
        patch.remove(ID_FIELD);
        let mut accounts = self.lock()?;
        let entry = accounts
            .get_mut(id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::not_found(id))?;
        for (field, value) in patch {
            entry.insert(field, value);
        }
        Ok(())
    }

    async fn remove_account(&self, id: &str) -> Result<(), StoreError> {
        let mut accounts = self.lock()?;
        accounts
            .shift_remove(id)
            .ok_or_else(|| StoreError::not_found(id))?;
        Ok(())
    }

    async fn accounts(&self) -> Result<Collection, StoreError> {
        Ok(self.lock()?.clone())
    }
}
