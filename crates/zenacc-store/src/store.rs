//! The public CRUD/query surface over one on-disk account collection.
//!
//! Every operation reloads the whole file, mutates in memory, and writes
//! the whole file back; the file is the entire database. Mutating cycles
//! on one store instance are serialized by an internal mutex, so two
//! concurrent `add_account` calls cannot lose an update. Separate store
//! instances over the same directory are the caller's responsibility.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use zenacc_core::matching::matches_predicate;
use zenacc_core::records::new_record_id;
use zenacc_core::{Account, AccountRecords, Collection, StoreError, ID_FIELD};

use crate::codec;
use crate::fsio::write_atomic;
use crate::keys::{KeyManager, StoreKey};

/// Construction options for one named store. Serde-enabled so hosts can
/// keep store settings in their own config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name; derives the account and key file names.
    pub name: String,
    /// Directory holding the store's files, created on open.
    pub main_directory: PathBuf,
    /// Whether the account file is encrypted at rest.
    pub encrypt: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "Main".to_string(),
            main_directory: PathBuf::from("Accounts"),
            encrypt: true,
        }
    }
}

/// File-backed account store. See [`AccountRecords`] for the operation
/// contract; `open` creates the directory, an empty collection file, and
/// (for encrypted stores) the key on first use.
pub struct AccountStore {
    name: String,
    account_path: PathBuf,
    keys: Option<KeyManager>,
    // Serializes read-modify-write cycles on this instance.
    cycle: Mutex<()>,
}

impl AccountStore {
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let StoreConfig {
            name,
            main_directory,
            encrypt,
        } = config;

        std::fs::create_dir_all(&main_directory)
            .map_err(|err| StoreError::io(format!("{}: {err}", main_directory.display())))?;

        let extension = if encrypt { "zenexacc" } else { "json" };
        let account_path = main_directory.join(format!("Accounts-{name}.{extension}"));
        let keys = encrypt.then(|| KeyManager::new(main_directory.join(format!("key-{name}"))));

        let store = Self {
            name,
            account_path,
            keys,
            cycle: Mutex::new(()),
        };

        if let Some(keys) = &store.keys {
            keys.get_or_create()?;
        }
        if !store.account_path.exists() {
            debug!(store = %store.name, "creating empty collection file");
            store.persist(&Collection::new())?;
        }
        Ok(store)
    }

    /// Replace the store key and re-encrypt the collection under it.
    ///
    /// Serialized against every CRUD operation on this instance. On an
    /// unencrypted store this is a no-op.
    #[instrument(skip_all, fields(store = %self.name))]
    pub async fn rotate_key(&self) -> Result<(), StoreError> {
        let Some(keys) = &self.keys else {
            warn!("key rotation requested on an unencrypted store");
            return Ok(());
        };

        let _guard = self.cycle.lock().await;
        keys.rotate(|current, next| {
            // No existing key means nothing readable to re-encrypt.
            let Some(current) = current else {
                return Ok(());
            };
            let bytes = self.read_account_file()?;
            let accounts = codec::decode(&bytes, Some(current))?;
            let reencrypted = codec::encode(&accounts, Some(next))?;
            write_atomic(&self.account_path, &reencrypted)
        })?;
        Ok(())
    }

    fn read_account_file(&self) -> Result<Vec<u8>, StoreError> {
        std::fs::read(&self.account_path)
            .map_err(|err| StoreError::io(format!("{}: {err}", self.account_path.display())))
    }

    fn current_key(&self) -> Result<Option<StoreKey>, StoreError> {
        self.keys.as_ref().map(KeyManager::get_or_create).transpose()
    }

    fn load(&self) -> Result<Collection, StoreError> {
        let key = self.current_key()?;
        let bytes = self.read_account_file()?;
        codec::decode(&bytes, key.as_ref())
    }

    fn persist(&self, accounts: &Collection) -> Result<(), StoreError> {
        let key = self.current_key()?;
        let bytes = codec::encode(accounts, key.as_ref())?;
        write_atomic(&self.account_path, &bytes)
    }
}

#[async_trait]
impl AccountRecords for AccountStore {
    #[instrument(skip_all, fields(store = %self.name))]
    async fn add_account(&self, mut fields: Account) -> Result<String, StoreError> {
        let _guard = self.cycle.lock().await;
        let mut accounts = self.load()?;

        let mut id = new_record_id();
        while accounts.contains_key(&id) {
            id = new_record_id();
        }
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        accounts.insert(id.clone(), Value::Object(fields));

        self.persist(&accounts)?;
        Ok(id)
    }

    #[instrument(skip_all, fields(store = %self.name))]
    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.load()?;
        Ok(accounts.get(id).and_then(Value::as_object).cloned())
    }

    #[instrument(skip_all, fields(store = %self.name))]
    async fn get_from_object(&self, predicate: &Account) -> Result<Option<Account>, StoreError> {
        let accounts = self.load()?;
        Ok(accounts
            .values()
            .filter_map(Value::as_object)
            .find(|account| matches_predicate(account, predicate))
            .cloned())
    }

    #[instrument(skip_all, fields(store = %self.name))]
    async fn get_many_from_object(&self, predicate: &Account) -> Result<Vec<Account>, StoreError> {
        let accounts = self.load()?;
        Ok(accounts
            .values()
            .filter_map(Value::as_object)
            .filter(|account| matches_predicate(account, predicate))
            .cloned()
            .collect())
    }

    #[instrument(skip_all, fields(store = %self.name))]
    async fn modify_account(&self, id: &str, mut patch: Account) -> Result<(), StoreError> {
        // The id is system-assigned and immutable.
        patch.remove(ID_FIELD);

        let _guard = self.cycle.lock().await;
        let mut accounts = self.load()?;
        let entry = accounts
            .get_mut(id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::not_found(id))?;
        for (field, value) in patch {
            entry.insert(field, value);
        }

        self.persist(&accounts)
    }

    #[instrument(skip_all, fields(store = %self.name))]
    async fn remove_account(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.cycle.lock().await;
        let mut accounts = self.load()?;
        accounts
            .shift_remove(id)
            .ok_or_else(|| StoreError::not_found(id))?;
        self.persist(&accounts)
    }

    #[instrument(skip_all, fields(store = %self.name))]
    async fn accounts(&self) -> Result<Collection, StoreError> {
        self.load()
    }
}
