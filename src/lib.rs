/*!
 * Keywarden Key Lifecycle Module
 *
 * This module implements the secure-key lifecycle subsystem: versioned
 * encryption-key rotation under compliance policy, hardware-backed key
 * derivation, an append-only audit trail, compliance reporting, and a
 * crash-safe, resumable migration engine that moves secrets from an unsafe
 * legacy store into a protected one with checksum verification and rollback.
 *
 * The main building blocks are:
 *
 * - A key registry holding versioned metadata, where superseded versions are
 *   retired but never deleted so old ciphertext stays decryptable
 * - HKDF-SHA256 derivation from a hardware-backed base key
 * - A policy engine gating rotation on interval, key age and quiet hours
 * - AES-256-GCM for the versioned envelope and ChaCha20-Poly1305 for the
 *   legacy envelope handled during migration
 */

/// Append-only audit trail for security-relevant events
pub mod audit;

/// Hardware-backed symmetric key derivation
pub mod derivation;

/// Common error types for the key lifecycle module
pub mod error;

/// Hardware key source contracts and software fallback
pub mod hardware;

/// Crash-safe secret migration between stores
pub mod migration;

/// Rotation policy and decision logic
pub mod policy;

/// Versioned key metadata registry
pub mod registry;

/// Key rotation orchestration and compliance reporting
pub mod rotation;

/// Secure memory handling utilities
pub mod secure_memory;

/// Secret key-value store contracts
pub mod store;

/// Utilities for hashing, randomness and encoding
pub mod utils;

// Re-export main types for convenience
pub use audit::AuditEvent;
pub use audit::AuditEventKind;
pub use audit::AuditLog;
pub use derivation::KeyDerivationService;
pub use error::{KeyLifecycleError, KeyLifecycleResult};
pub use hardware::HardwareKeySource;
pub use hardware::SoftwareKeySource;
pub use migration::LegacyMigrationAdapter;
pub use migration::MigrationIntegrityEngine;
pub use migration::MigrationProgress;
pub use migration::MigrationReport;
pub use migration::MigrationStatus;
pub use policy::RotationPolicy;
pub use policy::RotationPolicyEngine;
pub use registry::KeyMetadata;
pub use registry::KeyRegistry;
pub use registry::KeyStatus;
pub use rotation::ComplianceReport;
pub use rotation::KeyRotationCoordinator;
pub use secure_memory::SecureBytes;
pub use secure_memory::SymmetricKey;
pub use store::MemoryStore;
pub use store::SecretStore;

/// Encrypt data under the current active key version
///
/// Seals the plaintext in the versioned envelope so that
/// [`decrypt_data`] can later derive the right key even after the version
/// has been retired by a rotation.
///
/// # Arguments
///
/// * `coordinator` - The rotation coordinator holding the active key
/// * `plaintext` - The data to encrypt
/// * `associated_data` - Additional data to authenticate but not encrypt
///
/// # Returns
///
/// The versioned envelope bytes, or an error
pub fn encrypt_data<H: hardware::HardwareKeySource>(
    coordinator: &KeyRotationCoordinator<H>,
    plaintext: &[u8],
    associated_data: Option<&[u8]>,
) -> KeyLifecycleResult<Vec<u8>> {
    let version = coordinator.current_version();
    let key = coordinator.current_encryption_key()?;
    migration::seal_versioned(plaintext, &key, version, associated_data)
}

/// Decrypt a versioned envelope
///
/// Reads the key version recorded in the envelope and derives that version's
/// key, accepting retired versions so that data sealed before a rotation
/// stays readable.
///
/// # Arguments
///
/// * `coordinator` - The rotation coordinator holding the key registry
/// * `data` - The versioned envelope bytes
/// * `associated_data` - The associated data used at encryption time
///
/// # Returns
///
/// The decrypted plaintext, or an error when the envelope does not parse,
/// the version is unknown or compromised, or authentication fails
pub fn decrypt_data<H: hardware::HardwareKeySource>(
    coordinator: &KeyRotationCoordinator<H>,
    data: &[u8],
    associated_data: Option<&[u8]>,
) -> KeyLifecycleResult<Vec<u8>> {
    let version = migration::envelope_key_version(data).ok_or_else(|| {
        KeyLifecycleError::decryption_failed(
            "decrypt_data",
            "data is not a versioned envelope",
            error::error_codes::LEGACY_INVALID_ENVELOPE,
        )
    })?;
    let key = coordinator.key_for_decryption(version)?;
    migration::open_versioned(data, &key, associated_data)
}

/// Provides a simplified interface to the most commonly used operations.
///
/// This aims to make the library easier to use with reasonable defaults.
pub mod prelude {
    pub use crate::audit::AuditEvent;
    pub use crate::audit::AuditEventKind;
    pub use crate::audit::AuditLog;
    pub use crate::decrypt_data;
    pub use crate::derivation::KeyDerivationService;
    pub use crate::encrypt_data;
    pub use crate::hardware::HardwareKeySource;
    pub use crate::hardware::SoftwareKeySource;
    pub use crate::migration::LegacyMigrationAdapter;
    pub use crate::migration::MigrationIntegrityEngine;
    pub use crate::migration::MigrationReport;
    pub use crate::migration::MigrationStatus;
    pub use crate::policy::ComplianceMode;
    pub use crate::policy::QuietHours;
    pub use crate::policy::RotationPolicy;
    pub use crate::policy::RotationPolicyEngine;
    pub use crate::registry::KeyMetadata;
    pub use crate::registry::KeyRegistry;
    pub use crate::registry::KeyStatus;
    pub use crate::rotation::ComplianceLevel;
    pub use crate::rotation::ComplianceReport;
    pub use crate::rotation::ComplianceReporter;
    pub use crate::rotation::KeyRotationCoordinator;
    pub use crate::secure_memory::SecureBytes;
    pub use crate::secure_memory::SymmetricKey;
    pub use crate::store::MemoryStore;
    pub use crate::store::SecretStore;
    pub use crate::KeyLifecycleError;
    pub use crate::KeyLifecycleResult;
}
