/*!
 * Secret key-value store contracts
 *
 * This module defines the storage primitive the key lifecycle subsystem
 * requires from the platform: a simple key -> bytes store with existence and
 * idempotent delete. The protected store and the legacy store share the same
 * shape and differ only in which instance is injected.
 */

mod store;

pub use store::*;
