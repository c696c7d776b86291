/*!
 * Rotation policy and decision logic
 *
 * Pure functions deciding whether a rotation is due, overdue, or allowed at
 * a candidate time. All predicates take `now` explicitly so policy behavior
 * is testable without real wall-clock waits.
 */

mod policy;

pub use policy::*;

#[cfg(test)]
mod tests;
