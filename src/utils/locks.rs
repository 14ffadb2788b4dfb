use std::sync::{LockResult, PoisonError};

/// Returns the guard of a lock result even if a previous holder panicked.
///
/// Every lock in the crate guards plain data that stays consistent between
/// statements, so a poisoned lock is still safe to use.
pub fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
