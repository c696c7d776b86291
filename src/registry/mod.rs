/*!
 * Versioned key metadata registry
 *
 * Single source of truth for the status of every key version. Metadata is
 * never deleted: superseded versions are status-transitioned to retired (or
 * compromised) and retained indefinitely so old ciphertext stays decryptable.
 */

mod registry;

pub use registry::*;
