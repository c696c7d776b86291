use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key as AesKey, Nonce as AesNonce,
};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use log::{debug, info};

use crate::error::{error_codes, KeyLifecycleError, KeyLifecycleResult};
use crate::secure_memory::SymmetricKey;
use crate::store::SecretStore;
use crate::utils;

/// Store slot holding the fixed legacy key material
pub const LEGACY_KEY_SLOT: &str = "_legacy_master_key";

/// Magic prefix of the legacy ChaCha20-Poly1305 envelope
pub const LEGACY_ENVELOPE_MAGIC: &[u8; 4] = b"LGV1";

/// Magic prefix of the versioned AES-256-GCM envelope
pub const VERSIONED_ENVELOPE_MAGIC: &[u8; 4] = b"KWV1";

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Minimum size of a well-formed legacy envelope: magic, nonce, tag
const LEGACY_ENVELOPE_MIN: usize = LEGACY_ENVELOPE_MAGIC.len() + NONCE_SIZE + TAG_SIZE;

/// Re-encrypts payloads from the fixed legacy key to a versioned key
///
/// The legacy store predates versioned rotation: everything was sealed under
/// one fixed ChaCha20-Poly1305 key. This adapter decrypts such envelopes and
/// re-encrypts them under a versioned AES-256-GCM key for the phased cutover.
/// Distinct from the integrity engine, which moves unencrypted or opaque
/// blobs between stores.
pub struct LegacyMigrationAdapter {
    store: Arc<dyn SecretStore>,
}

impl LegacyMigrationAdapter {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Whether the fixed legacy key is still present
    pub fn has_legacy_key(&self) -> KeyLifecycleResult<bool> {
        self.store.exists(LEGACY_KEY_SLOT)
    }

    /// Install legacy key material, for staging a cutover or in tests
    pub fn install_legacy_key(&self, key: &SymmetricKey) -> KeyLifecycleResult<()> {
        self.store.put(LEGACY_KEY_SLOT, key.as_bytes())
    }

    /// Remove the fixed legacy key; a no-op if already absent
    pub fn remove_legacy_key(&self) -> KeyLifecycleResult<()> {
        info!("removing legacy key material");
        self.store.delete(LEGACY_KEY_SLOT)
    }

    /// Decrypt a legacy envelope under the fixed legacy key
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> KeyLifecycleResult<Vec<u8>> {
        let key = self.legacy_key()?;
        let (nonce, body) = parse_legacy_envelope(ciphertext)?;

        let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key.as_bytes()));
        cipher
            .decrypt(
                ChaChaNonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: associated_data.unwrap_or(&[]),
                },
            )
            .map_err(|e| {
                KeyLifecycleError::decryption_failed(
                    "legacy_decrypt",
                    &e.to_string(),
                    error_codes::LEGACY_DECRYPTION_FAILED,
                )
            })
    }

    /// Re-encrypt one legacy ciphertext under a versioned key
    ///
    /// Decrypts under the fixed legacy key, then seals under the new key in
    /// the versioned envelope. Associated data is threaded through both
    /// operations unchanged.
    pub fn migrate_ciphertext(
        &self,
        ciphertext: &[u8],
        new_key: &SymmetricKey,
        new_version: u32,
        associated_data: Option<&[u8]>,
    ) -> KeyLifecycleResult<Vec<u8>> {
        let plaintext = self.decrypt(ciphertext, associated_data)?;
        debug!("re-encrypting legacy payload under key version {}", new_version);
        seal_versioned(&plaintext, new_key, new_version, associated_data)
    }

    /// Re-encrypt a batch of legacy ciphertexts in order
    ///
    /// Strict: the first failing item aborts the whole batch and nothing is
    /// returned. This differs deliberately from the integrity engine's
    /// per-item tolerance; callers of a ciphertext cutover need
    /// all-or-nothing semantics.
    pub fn batch_migrate(
        &self,
        items: &[(&[u8], Option<&[u8]>)],
        new_key: &SymmetricKey,
        new_version: u32,
    ) -> KeyLifecycleResult<Vec<Vec<u8>>> {
        items
            .iter()
            .map(|(ciphertext, aad)| {
                self.migrate_ciphertext(ciphertext, new_key, new_version, *aad)
            })
            .collect()
    }

    /// Probe whether bytes parse as the legacy envelope, without decrypting
    pub fn is_legacy_format(&self, data: &[u8]) -> bool {
        data.len() >= LEGACY_ENVELOPE_MIN && data[..4] == LEGACY_ENVELOPE_MAGIC[..]
    }

    fn legacy_key(&self) -> KeyLifecycleResult<SymmetricKey> {
        let material = self
            .store
            .get(LEGACY_KEY_SLOT)?
            .ok_or_else(KeyLifecycleError::legacy_key_not_found)?;
        SymmetricKey::new(&material)
    }
}

/// Seal plaintext under the fixed legacy key layout
///
/// Layout: `LGV1 || nonce(12) || ciphertext+tag`. Exists for staging legacy
/// fixtures; production writes only the versioned envelope.
pub fn seal_legacy(
    plaintext: &[u8],
    key: &SymmetricKey,
    associated_data: Option<&[u8]>,
) -> KeyLifecycleResult<Vec<u8>> {
    let nonce_bytes = utils::random_bytes(NONCE_SIZE)?;
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key.as_bytes()));
    let body = cipher
        .encrypt(
            ChaChaNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: associated_data.unwrap_or(&[]),
            },
        )
        .map_err(|e| KeyLifecycleError::encryption_failed("legacy_seal", &e.to_string()))?;

    Ok(utils::concat_bytes(&[
        LEGACY_ENVELOPE_MAGIC,
        &nonce_bytes,
        &body,
    ]))
}

/// Seal plaintext under a versioned key
///
/// Layout: `KWV1 || version(4, big-endian) || nonce(12) || ciphertext+tag`.
/// The recorded version tells decrypt paths which retired key to derive.
pub fn seal_versioned(
    plaintext: &[u8],
    key: &SymmetricKey,
    version: u32,
    associated_data: Option<&[u8]>,
) -> KeyLifecycleResult<Vec<u8>> {
    let nonce_bytes = utils::random_bytes(NONCE_SIZE)?;
    let cipher = Aes256Gcm::new(AesKey::<Aes256Gcm>::from_slice(key.as_bytes()));
    let body = cipher
        .encrypt(
            AesNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: associated_data.unwrap_or(&[]),
            },
        )
        .map_err(|e| KeyLifecycleError::encryption_failed("versioned_seal", &e.to_string()))?;

    Ok(utils::concat_bytes(&[
        VERSIONED_ENVELOPE_MAGIC,
        &version.to_be_bytes(),
        &nonce_bytes,
        &body,
    ]))
}

/// Open a versioned envelope with the key for its recorded version
pub fn open_versioned(
    data: &[u8],
    key: &SymmetricKey,
    associated_data: Option<&[u8]>,
) -> KeyLifecycleResult<Vec<u8>> {
    let (_, nonce, body) = parse_versioned_envelope(data)?;
    let cipher = Aes256Gcm::new(AesKey::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(
            AesNonce::from_slice(nonce),
            Payload {
                msg: body,
                aad: associated_data.unwrap_or(&[]),
            },
        )
        .map_err(|e| {
            KeyLifecycleError::decryption_failed(
                "versioned_open",
                &e.to_string(),
                error_codes::LEGACY_DECRYPTION_FAILED,
            )
        })
}

/// The key version recorded in a versioned envelope, if the bytes parse
pub fn envelope_key_version(data: &[u8]) -> Option<u32> {
    parse_versioned_envelope(data)
        .ok()
        .map(|(version, _, _)| version)
}

fn parse_legacy_envelope(data: &[u8]) -> KeyLifecycleResult<(&[u8], &[u8])> {
    if data.len() < LEGACY_ENVELOPE_MIN || data[..4] != LEGACY_ENVELOPE_MAGIC[..] {
        return Err(KeyLifecycleError::DecryptionFailed {
            operation: "parse_legacy_envelope".to_string(),
            cause: "data is not a legacy envelope".to_string(),
            error_code: error_codes::LEGACY_INVALID_ENVELOPE,
        });
    }
    let nonce = &data[4..4 + NONCE_SIZE];
    let body = &data[4 + NONCE_SIZE..];
    Ok((nonce, body))
}

fn parse_versioned_envelope(data: &[u8]) -> KeyLifecycleResult<(u32, &[u8], &[u8])> {
    let header = VERSIONED_ENVELOPE_MAGIC.len() + 4;
    if data.len() < header + NONCE_SIZE + TAG_SIZE || data[..4] != VERSIONED_ENVELOPE_MAGIC[..] {
        return Err(KeyLifecycleError::DecryptionFailed {
            operation: "parse_versioned_envelope".to_string(),
            cause: "data is not a versioned envelope".to_string(),
            error_code: error_codes::LEGACY_INVALID_ENVELOPE,
        });
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let nonce = &data[header..header + NONCE_SIZE];
    let body = &data[header + NONCE_SIZE..];
    Ok((version, nonce, body))
}
