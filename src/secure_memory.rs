/*!
 * Secure memory handling for symmetric key material
 *
 * Provides containers that automatically zero their contents when dropped,
 * preventing key material from lingering in memory after use.
 */

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyLifecycleError;
use crate::utils;

/// The size in bytes of every symmetric key produced by this crate
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// A memory-safe container for sensitive byte data
///
/// SecureBytes automatically zeroes its memory when dropped and compares in
/// constant time, making it suitable for cryptographic keys, salts and other
/// secret material.
///
/// # Security Properties
///
/// 1. Automatically zeroes memory when dropped
/// 2. Prevents contents from being inadvertently logged or displayed
/// 3. Equality comparison runs in constant time
///
/// # Example
///
/// ```
/// use keywarden::secure_memory::SecureBytes;
///
/// let key = SecureBytes::new(&[0x01, 0x02, 0x03, 0x04]);
/// let key_bytes = key.as_bytes();
/// // When key goes out of scope, memory is securely zeroed
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Create a new SecureBytes containing a copy of the provided data
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Get a reference to the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the container and return the contained bytes
    ///
    /// After calling this method, it becomes the caller's responsibility to
    /// properly handle and zeroize the sensitive data.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Get the current length of the buffer in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        utils::constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for SecureBytes {}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureBytes")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 256-bit symmetric encryption key
///
/// Newtype over [`SecureBytes`] enforcing the fixed key size expected by the
/// AEAD ciphers in this crate. Construction validates the length so that a
/// `SymmetricKey` is always usable as cipher input.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    material: SecureBytes,
}

impl SymmetricKey {
    /// Wrap raw key material, validating its length
    pub fn new(material: &[u8]) -> Result<Self, KeyLifecycleError> {
        if material.len() != SYMMETRIC_KEY_SIZE {
            return Err(KeyLifecycleError::invalid_parameter(
                "key",
                &format!("{} bytes", SYMMETRIC_KEY_SIZE),
                &format!("{} bytes", material.len()),
            ));
        }

        Ok(Self {
            material: SecureBytes::new(material),
        })
    }

    /// Get a reference to the raw key bytes for cipher initialization
    pub fn as_bytes(&self) -> &[u8] {
        self.material.as_bytes()
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("material", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_bytes_round_trip() {
        let data = [0x42u8; 16];
        let secure = SecureBytes::new(&data);
        assert_eq!(secure.as_bytes(), &data);
        assert_eq!(secure.len(), 16);
        assert!(!secure.is_empty());
    }

    #[test]
    fn test_secure_bytes_debug_redacts_content() {
        let secure = SecureBytes::new(b"super secret");
        let rendered = format!("{:?}", secure);
        assert!(!rendered.contains("super secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_secure_bytes_constant_time_eq() {
        let a = SecureBytes::new(&[1, 2, 3]);
        let b = SecureBytes::new(&[1, 2, 3]);
        let c = SecureBytes::new(&[1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_symmetric_key_enforces_size() {
        assert!(SymmetricKey::new(&[0u8; 32]).is_ok());
        assert!(SymmetricKey::new(&[0u8; 16]).is_err());
        assert!(SymmetricKey::new(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_symmetric_key_debug_redacts_material() {
        let key = SymmetricKey::new(&[0x17u8; 32]).unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("17"));
    }
}
