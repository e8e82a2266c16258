//! Object identity and the shared plumbing behind every user-facing handle.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::Context;
use crate::engine::command::Command;

/// Identifies an object within its context. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;

/// Anything created inside a [`Context`].
pub trait Object: Sealed {
    fn id(&self) -> ObjectId;

    fn context(&self) -> &Context;
}

/// Objects that can be added to a source.
pub trait Generator: Object {}

/// Objects that can feed effects through routes.
pub trait Source: Object {}

/// Objects that can receive routes.
pub trait Effect: Object {}

/// State shared by every clone of one handle.
///
/// `P` caches the last value written to each property so getters never have
/// to reach into the audio thread. Dropping the last clone destroys the
/// object at the next block boundary.
pub(crate) struct HandleInner<P> {
    id: ObjectId,
    context: Context,
    props: Mutex<P>,
}

impl<P> HandleInner<P> {
    /// Register `id` with `context`; `insert` must already be built for it.
    pub(crate) fn register(context: &Context, id: ObjectId, props: P, insert: Command) -> Self {
        context.register(id);
        context.submit(insert);
        Self {
            id,
            context: context.clone(),
            props: Mutex::new(props),
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn props(&self) -> MutexGuard<'_, P> {
        self.props.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn submit(&self, command: Command) {
        self.context.submit(command);
    }
}

impl<P> Drop for HandleInner<P> {
    fn drop(&mut self) {
        self.context.destroy(self.id);
    }
}

/// Implements [`Object`] and the given role traits for a handle type
/// holding an `inner: Arc<HandleInner<_>>`.
macro_rules! impl_object {
    ($ty:ty $(, $role:path)*) => {
        impl $crate::handle::Sealed for $ty {}

        impl $crate::handle::Object for $ty {
            fn id(&self) -> $crate::handle::ObjectId {
                self.inner.id()
            }

            fn context(&self) -> &$crate::context::Context {
                self.inner.context()
            }
        }

        $(impl $role for $ty {})*
    };
}

pub(crate) use impl_object;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_order_by_creation() {
        let a = ObjectId::new(1);
        let b = ObjectId::new(2);
        assert!(a < b);
        assert_eq!(b.raw(), 2);
        assert_eq!(a.to_string(), "#1");
    }
}
