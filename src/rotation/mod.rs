/*!
 * Key rotation orchestration and compliance reporting
 *
 * The coordinator owns the rotation mutual-exclusion guard and wires the
 * registry, derivation service, policy engine and audit log together. The
 * compliance submodule assembles point-in-time reports from registry and
 * audit snapshots.
 */

mod compliance;
mod coordinator;

pub use compliance::*;
pub use coordinator::*;
