//! Library-wide initialization.
//!
//! Contexts may only be created while at least one [`InitGuard`] is alive.
//! Guards nest, so independent components can each hold their own.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Keeps the library initialized until dropped.
#[derive(Debug)]
#[must_use = "the library shuts down when the guard is dropped"]
pub struct InitGuard {
    _private: (),
}

/// Initialize the library. Pair with the returned guard's lifetime.
pub fn initialize() -> Result<InitGuard> {
    let prev = INIT_COUNT.fetch_add(1, Ordering::AcqRel);
    if prev == 0 {
        tracing::debug!("library initialized");
    }
    Ok(InitGuard { _private: () })
}

/// Whether any [`InitGuard`] is alive.
pub fn is_initialized() -> bool {
    INIT_COUNT.load(Ordering::Acquire) > 0
}

pub(crate) fn ensure_initialized() -> Result<()> {
    if is_initialized() {
        Ok(())
    } else {
        Err(Error::NotInitialized)
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        if INIT_COUNT.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::debug!("library shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_nest() {
        let a = initialize().unwrap();
        let b = initialize().unwrap();
        assert!(is_initialized());
        drop(a);
        assert!(is_initialized());
        drop(b);
    }
}
