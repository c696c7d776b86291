/*!
 * Hardware-backed symmetric key derivation
 *
 * Wraps a hardware key source and produces a stable base symmetric key plus,
 * per key version, a derived sub-key. Derivation is HKDF-SHA256 and is a pure
 * function of (base key, salt, info), which is what keeps old ciphertext
 * decryptable across process restarts.
 */

mod service;

pub use service::*;
