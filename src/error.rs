/*!
 * Error Handling for the Keywarden Key Lifecycle Module
 *
 * Provides comprehensive error types with detailed diagnostics, error codes,
 * and user-friendly messages for key rotation, derivation, auditing and
 * migration operations.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Comprehensive error type for all key lifecycle operations
#[derive(Debug, Error)]
pub enum KeyLifecycleError {
    #[error("Rotation policy violation: {policy} - {details}")]
    PolicyViolation {
        policy: String,
        details: String,
        error_code: u32,
    },

    #[error("Invalid rotation policy: {parameter} - {details}")]
    InvalidPolicy {
        parameter: String,
        details: String,
        error_code: u32,
    },

    #[error("Key version {version} not found")]
    KeyVersionNotFound { version: u32, error_code: u32 },

    #[error("Key version {version} is not usable for this operation: {details}")]
    InvalidKeyVersion {
        version: u32,
        details: String,
        error_code: u32,
    },

    #[error("Rotation already in progress")]
    RotationInProgress { error_code: u32 },

    #[error("Migration session '{session_id}' not found")]
    MigrationSessionNotFound {
        session_id: String,
        error_code: u32,
    },

    #[error("Migration error: {operation} - {cause}")]
    MigrationError {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Checksum mismatch for item '{key}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Migration verification failed: {details}")]
    VerificationFailed { details: String, error_code: u32 },

    #[error("Backup failed: {cause}")]
    BackupFailed { cause: String, error_code: u32 },

    #[error("Storage operation failed: {operation} on '{key}' - {cause}")]
    StorageFailure {
        operation: String,
        key: String,
        cause: String,
        error_code: u32,
    },

    #[error("Hardware key source unavailable: {cause}")]
    HardwareUnavailable { cause: String, error_code: u32 },

    #[error("Key derivation failed: {operation} - {cause}")]
    DerivationFailed {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Encryption failed: {operation} - {cause}")]
    EncryptionFailed {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Decryption failed: {operation} - {cause}")]
    DecryptionFailed {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Legacy key not found")]
    LegacyKeyNotFound { error_code: u32 },

    #[error("Invalid parameter: {parameter} - expected {expected}, got {actual}")]
    InvalidParameter {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Dependency not initialized: {dependency}")]
    NotInitialized { dependency: String, error_code: u32 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Random number generation failed: {cause}")]
    RandomGenerationError { cause: String, error_code: u32 },
}

/// Error code constants for different error categories
pub mod error_codes {
    // Registry errors: 1000-1999
    pub const KEY_VERSION_NOT_FOUND: u32 = 1001;
    pub const KEY_VERSION_NOT_ACTIVE: u32 = 1002;
    pub const KEY_VERSION_COMPROMISED: u32 = 1003;
    pub const KEY_VERSION_PENDING: u32 = 1004;

    // Policy errors: 2000-2999
    pub const QUIET_HOURS_ACTIVE: u32 = 2001;
    pub const MIN_KEY_AGE_NOT_REACHED: u32 = 2002;
    pub const INVALID_ROTATION_INTERVAL: u32 = 2003;
    pub const INVALID_MAX_KEY_AGE: u32 = 2004;
    pub const INVALID_MIN_KEY_AGE: u32 = 2005;
    pub const INVALID_QUIET_HOURS: u32 = 2006;

    // Rotation errors: 3000-3999
    pub const ROTATION_IN_PROGRESS: u32 = 3001;
    pub const ROTATION_FAILED: u32 = 3002;

    // Derivation errors: 4000-4999
    pub const HARDWARE_UNAVAILABLE: u32 = 4001;
    pub const HARDWARE_KEY_GENERATION_FAILED: u32 = 4002;
    pub const KEY_DERIVATION_FAILED: u32 = 4003;
    pub const INVALID_SALT_LENGTH: u32 = 4004;

    // Audit errors: 5000-5999
    pub const AUDIT_PERSIST_FAILED: u32 = 5001;

    // Migration errors: 6000-6999
    pub const MIGRATION_SESSION_NOT_FOUND: u32 = 6001;
    pub const MIGRATION_BACKUP_FAILED: u32 = 6002;
    pub const MIGRATION_CHECKSUM_MISMATCH: u32 = 6003;
    pub const MIGRATION_VERIFICATION_FAILED: u32 = 6004;
    pub const MIGRATION_ROLLBACK_FAILED: u32 = 6005;
    pub const MIGRATION_NOT_RESUMABLE: u32 = 6006;

    // Legacy adapter errors: 7000-7999
    pub const LEGACY_KEY_NOT_FOUND: u32 = 7001;
    pub const LEGACY_DECRYPTION_FAILED: u32 = 7002;
    pub const LEGACY_INVALID_ENVELOPE: u32 = 7003;
    pub const LEGACY_BATCH_ABORTED: u32 = 7004;

    // Storage errors: 8000-8999
    pub const STORE_PUT_FAILED: u32 = 8001;
    pub const STORE_GET_FAILED: u32 = 8002;
    pub const STORE_DELETE_FAILED: u32 = 8003;

    // General errors: 9000-9999
    pub const SERIALIZATION_FAILED: u32 = 9001;
    pub const RANDOM_GENERATION_FAILED: u32 = 9002;
    pub const NOT_INITIALIZED: u32 = 9003;
    pub const INVALID_PARAMETER: u32 = 9999;
}

impl KeyLifecycleError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            KeyLifecycleError::PolicyViolation { error_code, .. } => *error_code,
            KeyLifecycleError::InvalidPolicy { error_code, .. } => *error_code,
            KeyLifecycleError::KeyVersionNotFound { error_code, .. } => *error_code,
            KeyLifecycleError::InvalidKeyVersion { error_code, .. } => *error_code,
            KeyLifecycleError::RotationInProgress { error_code } => *error_code,
            KeyLifecycleError::MigrationSessionNotFound { error_code, .. } => *error_code,
            KeyLifecycleError::MigrationError { error_code, .. } => *error_code,
            KeyLifecycleError::ChecksumMismatch { error_code, .. } => *error_code,
            KeyLifecycleError::VerificationFailed { error_code, .. } => *error_code,
            KeyLifecycleError::BackupFailed { error_code, .. } => *error_code,
            KeyLifecycleError::StorageFailure { error_code, .. } => *error_code,
            KeyLifecycleError::HardwareUnavailable { error_code, .. } => *error_code,
            KeyLifecycleError::DerivationFailed { error_code, .. } => *error_code,
            KeyLifecycleError::EncryptionFailed { error_code, .. } => *error_code,
            KeyLifecycleError::DecryptionFailed { error_code, .. } => *error_code,
            KeyLifecycleError::LegacyKeyNotFound { error_code } => *error_code,
            KeyLifecycleError::InvalidParameter { error_code, .. } => *error_code,
            KeyLifecycleError::NotInitialized { error_code, .. } => *error_code,
            KeyLifecycleError::SerializationError(_) => error_codes::SERIALIZATION_FAILED,
            KeyLifecycleError::RandomGenerationError { error_code, .. } => *error_code,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            KeyLifecycleError::PolicyViolation { .. } => "PolicyViolation",
            KeyLifecycleError::InvalidPolicy { .. } => "InvalidPolicy",
            KeyLifecycleError::KeyVersionNotFound { .. } => "KeyVersionNotFound",
            KeyLifecycleError::InvalidKeyVersion { .. } => "InvalidKeyVersion",
            KeyLifecycleError::RotationInProgress { .. } => "RotationInProgress",
            KeyLifecycleError::MigrationSessionNotFound { .. } => "MigrationSessionNotFound",
            KeyLifecycleError::MigrationError { .. } => "MigrationError",
            KeyLifecycleError::ChecksumMismatch { .. } => "ChecksumMismatch",
            KeyLifecycleError::VerificationFailed { .. } => "VerificationFailed",
            KeyLifecycleError::BackupFailed { .. } => "BackupFailed",
            KeyLifecycleError::StorageFailure { .. } => "StorageFailure",
            KeyLifecycleError::HardwareUnavailable { .. } => "HardwareUnavailable",
            KeyLifecycleError::DerivationFailed { .. } => "DerivationFailed",
            KeyLifecycleError::EncryptionFailed { .. } => "EncryptionFailed",
            KeyLifecycleError::DecryptionFailed { .. } => "DecryptionFailed",
            KeyLifecycleError::LegacyKeyNotFound { .. } => "LegacyKeyNotFound",
            KeyLifecycleError::InvalidParameter { .. } => "InvalidParameter",
            KeyLifecycleError::NotInitialized { .. } => "NotInitialized",
            KeyLifecycleError::SerializationError(_) => "SerializationError",
            KeyLifecycleError::RandomGenerationError { .. } => "RandomGenerationError",
        }
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            KeyLifecycleError::PolicyViolation { policy, .. } => {
                format!(
                    "Rotation blocked by policy '{}'. Retry outside the restricted window.",
                    policy
                )
            }
            KeyLifecycleError::InvalidPolicy { parameter, .. } => {
                format!(
                    "Rotation policy parameter '{}' is invalid. The policy was not applied.",
                    parameter
                )
            }
            KeyLifecycleError::KeyVersionNotFound { version, .. } => {
                format!(
                    "Key version {} does not exist. Data encrypted under it cannot be recovered.",
                    version
                )
            }
            KeyLifecycleError::InvalidKeyVersion { version, .. } => {
                format!(
                    "Key version {} cannot be used for encryption. Use the current active version.",
                    version
                )
            }
            KeyLifecycleError::RotationInProgress { .. } => {
                "Another key rotation is already running. Retry once it completes.".to_string()
            }
            KeyLifecycleError::MigrationSessionNotFound { session_id, .. } => {
                format!(
                    "Migration session '{}' has no persisted progress record.",
                    session_id
                )
            }
            KeyLifecycleError::MigrationError { operation, .. } => {
                format!(
                    "Migration operation '{}' failed. The session may be resumable.",
                    operation
                )
            }
            KeyLifecycleError::ChecksumMismatch { key, .. } => {
                format!(
                    "Item '{}' was corrupted in transit between stores. It was not removed from the source.",
                    key
                )
            }
            KeyLifecycleError::VerificationFailed { .. } => {
                "Post-migration verification failed. Migrated data may be corrupted.".to_string()
            }
            KeyLifecycleError::BackupFailed { .. } => {
                "Pre-migration backup failed. No items were migrated.".to_string()
            }
            KeyLifecycleError::StorageFailure { operation, .. } => {
                format!(
                    "Secure storage operation '{}' failed. Check the underlying store.",
                    operation
                )
            }
            KeyLifecycleError::HardwareUnavailable { .. } => {
                "Hardware-backed key storage is not available on this platform.".to_string()
            }
            KeyLifecycleError::DerivationFailed { operation, .. } => {
                format!(
                    "Key derivation operation '{}' failed. Encryption keys are unavailable.",
                    operation
                )
            }
            KeyLifecycleError::EncryptionFailed { operation, .. } => {
                format!("Encryption operation '{}' failed.", operation)
            }
            KeyLifecycleError::DecryptionFailed { operation, .. } => {
                format!(
                    "Decryption operation '{}' failed. The data may be tampered with or corrupted.",
                    operation
                )
            }
            KeyLifecycleError::LegacyKeyNotFound { .. } => {
                "No legacy encryption key is present. Legacy data cannot be migrated.".to_string()
            }
            KeyLifecycleError::InvalidParameter {
                parameter, expected, ..
            } => {
                format!(
                    "Invalid parameter '{}'. Expected '{}' format.",
                    parameter, expected
                )
            }
            KeyLifecycleError::NotInitialized { dependency, .. } => {
                format!(
                    "Required collaborator '{}' was not wired at construction time.",
                    dependency
                )
            }
            KeyLifecycleError::SerializationError(_) => {
                "Persisted record serialization failed. The record format may be corrupted."
                    .to_string()
            }
            KeyLifecycleError::RandomGenerationError { .. } => {
                "Random number generation failed. Cryptographic operations may be insecure."
                    .to_string()
            }
        }
    }

    /// Whether the caller may retry the operation later at its own discretion
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeyLifecycleError::RotationInProgress { .. }
                | KeyLifecycleError::PolicyViolation { .. }
                | KeyLifecycleError::StorageFailure { .. }
        )
    }
}

/// Convenience constructors for common error types
impl KeyLifecycleError {
    pub fn policy_violation(policy: &str, details: &str, error_code: u32) -> Self {
        KeyLifecycleError::PolicyViolation {
            policy: policy.to_string(),
            details: details.to_string(),
            error_code,
        }
    }

    pub fn invalid_policy(parameter: &str, details: &str, error_code: u32) -> Self {
        KeyLifecycleError::InvalidPolicy {
            parameter: parameter.to_string(),
            details: details.to_string(),
            error_code,
        }
    }

    pub fn key_version_not_found(version: u32) -> Self {
        KeyLifecycleError::KeyVersionNotFound {
            version,
            error_code: error_codes::KEY_VERSION_NOT_FOUND,
        }
    }

    pub fn invalid_key_version(version: u32, details: &str, error_code: u32) -> Self {
        KeyLifecycleError::InvalidKeyVersion {
            version,
            details: details.to_string(),
            error_code,
        }
    }

    pub fn rotation_in_progress() -> Self {
        KeyLifecycleError::RotationInProgress {
            error_code: error_codes::ROTATION_IN_PROGRESS,
        }
    }

    pub fn migration_session_not_found(session_id: &str) -> Self {
        KeyLifecycleError::MigrationSessionNotFound {
            session_id: session_id.to_string(),
            error_code: error_codes::MIGRATION_SESSION_NOT_FOUND,
        }
    }

    pub fn migration_error(operation: &str, cause: &str, error_code: u32) -> Self {
        KeyLifecycleError::MigrationError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    pub fn checksum_mismatch(key: &str, expected: &str, actual: &str) -> Self {
        KeyLifecycleError::ChecksumMismatch {
            key: key.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code: error_codes::MIGRATION_CHECKSUM_MISMATCH,
        }
    }

    pub fn verification_failed(details: &str) -> Self {
        KeyLifecycleError::VerificationFailed {
            details: details.to_string(),
            error_code: error_codes::MIGRATION_VERIFICATION_FAILED,
        }
    }

    pub fn backup_failed(cause: &str) -> Self {
        KeyLifecycleError::BackupFailed {
            cause: cause.to_string(),
            error_code: error_codes::MIGRATION_BACKUP_FAILED,
        }
    }

    pub fn storage_failure(operation: &str, key: &str, cause: &str, error_code: u32) -> Self {
        KeyLifecycleError::StorageFailure {
            operation: operation.to_string(),
            key: key.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn hardware_unavailable(cause: &str) -> Self {
        KeyLifecycleError::HardwareUnavailable {
            cause: cause.to_string(),
            error_code: error_codes::HARDWARE_UNAVAILABLE,
        }
    }

    pub fn derivation_failed(operation: &str, cause: &str) -> Self {
        KeyLifecycleError::DerivationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::KEY_DERIVATION_FAILED,
        }
    }

    pub fn encryption_failed(operation: &str, cause: &str) -> Self {
        KeyLifecycleError::EncryptionFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::ROTATION_FAILED,
        }
    }

    pub fn decryption_failed(operation: &str, cause: &str, error_code: u32) -> Self {
        KeyLifecycleError::DecryptionFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn legacy_key_not_found() -> Self {
        KeyLifecycleError::LegacyKeyNotFound {
            error_code: error_codes::LEGACY_KEY_NOT_FOUND,
        }
    }

    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str) -> Self {
        KeyLifecycleError::InvalidParameter {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code: error_codes::INVALID_PARAMETER,
        }
    }

    pub fn not_initialized(dependency: &str) -> Self {
        KeyLifecycleError::NotInitialized {
            dependency: dependency.to_string(),
            error_code: error_codes::NOT_INITIALIZED,
        }
    }
}

impl From<serde_json::Error> for KeyLifecycleError {
    fn from(err: serde_json::Error) -> Self {
        KeyLifecycleError::SerializationError(err.to_string())
    }
}

/// Result type alias for key lifecycle operations
pub type KeyLifecycleResult<T> = Result<T, KeyLifecycleError>;
