use std::sync::RwLock;

use hkdf::Hkdf;
use log::{debug, info};
use sha2::Sha256;

use crate::error::{error_codes, KeyLifecycleError, KeyLifecycleResult};
use crate::hardware::{HardwareKeyHandle, HardwareKeySource};
use crate::registry::{DerivationAlgorithm, DerivationInfo, KeyMetadata};
use crate::secure_memory::{SymmetricKey, SYMMETRIC_KEY_SIZE};
use crate::utils;

/// Fixed salt binding the base key derivation
const BASE_KEY_SALT: &[u8] = b"base-key-salt-v1";

/// Fixed info string binding the base key derivation
const BASE_KEY_INFO: &[u8] = b"base-symmetric-key";

/// The info string binding one version's derivation
fn version_info(version: u32) -> Vec<u8> {
    format!("key-version-{}", version).into_bytes()
}

struct CachedBase {
    handle: HardwareKeyHandle,
    key: SymmetricKey,
}

/// Derives symmetric keys from a hardware key source
///
/// The base key is derived once from the hardware key's exported public
/// material and cached; per-version sub-keys are derived on demand from the
/// base key and the version's stored salt.
pub struct KeyDerivationService<H: HardwareKeySource> {
    source: H,
    cached: RwLock<Option<CachedBase>>,
}

impl<H: HardwareKeySource> KeyDerivationService<H> {
    pub fn new(source: H) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// The stable base symmetric key
    ///
    /// Cached after the first successful retrieval. When no hardware key
    /// exists yet one is generated lazily; fails with `HardwareUnavailable`
    /// when the platform lacks the capability.
    pub fn base_key(&self) -> KeyLifecycleResult<SymmetricKey> {
        if let Some(cached) = self.cached.read().expect("derivation lock poisoned").as_ref() {
            return Ok(cached.key.clone());
        }

        let mut guard = self.cached.write().expect("derivation lock poisoned");
        // Another thread may have populated the cache while we waited
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.key.clone());
        }

        if !self.source.is_available() {
            return Err(KeyLifecycleError::hardware_unavailable(
                "platform has no hardware key capability",
            ));
        }

        let handle = self.source.generate()?;
        let material = self.source.export_public_material(&handle)?;
        let key = hkdf_derive(&material, BASE_KEY_SALT, BASE_KEY_INFO)?;

        info!("generated hardware-backed base key '{}'", handle.id());
        *guard = Some(CachedBase {
            handle,
            key: key.clone(),
        });

        Ok(key)
    }

    /// Derive the symmetric key for one version
    ///
    /// Pure in (base key, salt, info): the same stored salt always yields the
    /// same key, which decrypt paths rely on for retired versions.
    pub fn derive_for_version(
        &self,
        version: u32,
        metadata: &KeyMetadata,
    ) -> KeyLifecycleResult<SymmetricKey> {
        let salt = &metadata.derivation_info.salt;
        if salt.len() != 32 {
            return Err(KeyLifecycleError::DerivationFailed {
                operation: "derive_for_version".to_string(),
                cause: format!("stored salt is {} bytes, expected 32", salt.len()),
                error_code: error_codes::INVALID_SALT_LENGTH,
            });
        }

        let base = self.base_key()?;
        debug!("deriving key for version {}", version);
        hkdf_derive(base.as_bytes(), salt, &version_info(version))
    }

    /// Discard the cached base key and destroy the hardware key material
    ///
    /// Forces regeneration on the next `base_key` call. This is the
    /// hardware-compromise path; routine version rotation keeps the hardware
    /// key and only creates a new salt.
    pub fn rotate_hardware_key(&self) -> KeyLifecycleResult<()> {
        let mut guard = self.cached.write().expect("derivation lock poisoned");
        if let Some(cached) = guard.take() {
            info!("destroying hardware key '{}'", cached.handle.id());
            self.source.destroy(&cached.handle)?;
        }
        Ok(())
    }

    /// Whether the underlying hardware capability is present
    pub fn is_hardware_available(&self) -> bool {
        self.source.is_available()
    }

    /// Fresh derivation parameters for a new key version
    pub fn fresh_derivation_info(&self) -> KeyLifecycleResult<DerivationInfo> {
        Ok(DerivationInfo {
            salt: utils::random_salt()?,
            iterations: 1,
            algorithm: DerivationAlgorithm::HkdfSha256,
        })
    }
}

/// HKDF-SHA256 with a 256-bit output
fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8]) -> KeyLifecycleResult<SymmetricKey> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; SYMMETRIC_KEY_SIZE];
    hk.expand(info, &mut okm)
        .map_err(|e| KeyLifecycleError::derivation_failed("hkdf_expand", &e.to_string()))?;
    SymmetricKey::new(&okm)
}
