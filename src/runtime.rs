//! Explicit execution context for spawning.
//!
//! Callers thread a [`Runtime`] through their call sites. Omitting it falls
//! back to the runtime the caller is currently executing under, and fails
//! with [`Error::NoActiveRuntime`](crate::error::Error::NoActiveRuntime)
//! when there is none.

use tokio::runtime::Handle;

use crate::error::Result;

/// A tokio runtime that tasks can be scheduled on.
#[derive(Debug, Clone)]
pub struct Runtime {
    handle: Handle,
}

impl Runtime {
    /// The runtime the calling thread is executing under.
    pub fn current() -> Result<Self> {
        Ok(Self {
            handle: Handle::try_current()?,
        })
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Use `explicit` if given, otherwise the ambient runtime.
    pub(crate) fn resolve(explicit: Option<&Runtime>) -> Result<Runtime> {
        match explicit {
            Some(runtime) => Ok(runtime.clone()),
            None => Self::current(),
        }
    }
}

impl From<Handle> for Runtime {
    fn from(handle: Handle) -> Self {
        Self::from_handle(handle)
    }
}
