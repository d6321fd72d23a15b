//! Collection ⇄ bytes. Plaintext stores hold pretty-printed JSON; encrypted
//! stores hold `hex(iv) + ":" + hex(ciphertext)` with a fresh 16-byte IV per
//! write and AES-256-CBC/PKCS#7 under the store key.
//!
//! Encryption is unauthenticated: a wrong or rotated key surfaces as a
//! [`StoreError::Decode`] (padding or JSON failure), not as a distinct
//! cryptographic error, and callers must not rely on the distinction.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use zenacc_core::{Collection, StoreError};

use crate::keys::StoreKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Serialize a collection, encrypting when a key is supplied.
pub fn encode(accounts: &Collection, key: Option<&StoreKey>) -> Result<Vec<u8>, StoreError> {
    let json = serde_json::to_vec_pretty(accounts).map_err(StoreError::decode)?;

    let Some(key) = key else {
        return Ok(json);
    };

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key.material(), &iv)
        .map_err(|err| StoreError::decode(format!("cipher init failed: {err}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(&json);

    Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)).into_bytes())
}

/// Parse stored bytes back into a collection, decrypting when a key is
/// supplied.
pub fn decode(bytes: &[u8], key: Option<&StoreKey>) -> Result<Collection, StoreError> {
    let plaintext = match key {
        Some(key) => decrypt(bytes, key)?,
        None => bytes.to_vec(),
    };
    serde_json::from_slice(&plaintext).map_err(StoreError::decode)
}

fn decrypt(bytes: &[u8], key: &StoreKey) -> Result<Vec<u8>, StoreError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| StoreError::decode("encrypted payload is not valid text"))?;
    let (iv_hex, ciphertext_hex) = text
        .split_once(':')
        .ok_or_else(|| StoreError::decode("missing iv separator"))?;

    let iv: [u8; IV_LEN] = hex::decode(iv_hex)
        .map_err(StoreError::decode)?
        .try_into()
        .map_err(|_| StoreError::decode("iv is not 16 bytes"))?;
    let ciphertext = hex::decode(ciphertext_hex).map_err(StoreError::decode)?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(StoreError::decode("ciphertext is not a whole block count"));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.material(), &iv)
        .map_err(|err| StoreError::decode(format!("cipher init failed: {err}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| StoreError::decode("decryption failed (wrong key or corrupted ciphertext)"))
}
