use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{error_codes, KeyLifecycleError};

/// Distinguished checksum value for absent data.
///
/// Never equal to any real digest: real digests are 64 lowercase hex
/// characters.
pub const EMPTY_CHECKSUM: &str = "empty";

/// Generate random bytes of the specified length
pub fn random_bytes(length: usize) -> Result<Vec<u8>, KeyLifecycleError> {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    Ok(bytes)
}

/// Constant-time comparison of two byte slices to avoid timing attacks
///
/// This function compares two byte slices in constant time to prevent
/// timing attacks that could leak information about the content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// Compute the lowercase hex SHA-256 digest of raw byte content
///
/// This is the checksum primitive used to verify byte-exact transfer of a
/// secret between stores.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the checksum for optionally-absent data
///
/// Absent data maps to the [`EMPTY_CHECKSUM`] sentinel so that "no value"
/// is distinguishable from every real digest.
pub fn checksum_of(data: Option<&[u8]>) -> String {
    match data {
        Some(bytes) => sha256_hex(bytes),
        None => EMPTY_CHECKSUM.to_string(),
    }
}

/// Constant-time comparison of two checksum strings
pub fn checksums_match(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Convert bytes to a hexadecimal string
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Convert a hexadecimal string to bytes
pub fn from_hex(hex_str: &str) -> Result<Vec<u8>, KeyLifecycleError> {
    hex::decode(hex_str).map_err(|e| {
        KeyLifecycleError::invalid_parameter("hex", "hexadecimal string", &e.to_string())
    })
}

/// Concatenate multiple byte slices efficiently
pub fn concat_bytes(slices: &[&[u8]]) -> Vec<u8> {
    let total_len = slices.iter().map(|s| s.len()).sum();
    let mut result = Vec::with_capacity(total_len);
    for slice in slices {
        result.extend_from_slice(slice);
    }
    result
}

/// Serde adapter serializing byte buffers as lowercase hex strings
///
/// Used for salts and hashes inside persisted JSON records.
pub mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Generate a fresh 32-byte derivation salt
pub fn random_salt() -> Result<Vec<u8>, KeyLifecycleError> {
    let salt = random_bytes(32)?;
    if salt.len() != 32 {
        return Err(KeyLifecycleError::RandomGenerationError {
            cause: "salt generation returned short buffer".to_string(),
            error_code: error_codes::RANDOM_GENERATION_FAILED,
        });
    }
    Ok(salt)
}
