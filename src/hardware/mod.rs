/*!
 * Hardware key source integration
 *
 * This module defines the contract for a tamper-resistant key-generation
 * facility (Secure Enclave, TPM, HSM). The facility exposes only an opaque
 * handle and exportable public material, never the raw private key; the
 * derivation service turns that public material into symmetric keys.
 */

mod source;

pub use source::*;
