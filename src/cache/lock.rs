//! Poison-tolerant access to the page cache's lock.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                target = "murmur::cache",
                op,
                caller = target,
                access = "read",
                "page cache lock was poisoned; continuing with its current contents"
            );
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                target = "murmur::cache",
                op,
                caller = target,
                access = "write",
                "page cache lock was poisoned; continuing with its current contents"
            );
            poisoned.into_inner()
        }
    }
}
