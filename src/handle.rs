//! Managed native handles.
//!
//! A [`Handle`] owns an opaque pointer into the native engine together with the
//! destructor that releases it. Any non-destructive use takes the shared side of
//! the lock; [`Handle::close`] and [`Handle::disarm`] take the exclusive side
//! without blocking, so a handle can never be released while someone is reading it.
//!
//! `Drop` only acts as a backstop for handles that were never closed explicitly.

use std::{
    ffi::c_void,
    fmt::Debug,
    ptr::{null_mut, NonNull},
};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Destructor invoked with the native pointer when a handle is closed.
pub type Destructor = unsafe extern "C-unwind" fn(*mut c_void);

/// Describes how a kind of native object is released.
#[derive(Debug, Clone, Copy)]
pub struct HandleTab {
    /// Name used in diagnostics (e.g. `"table"`).
    pub name: &'static str,
    pub dtor: Option<Destructor>,
}

impl HandleTab {
    pub const fn new(name: &'static str, dtor: Destructor) -> Self {
        Self {
            name,
            dtor: Some(dtor),
        }
    }

    /// A tab for pointers that are released elsewhere.
    pub const fn unowned(name: &'static str) -> Self {
        Self { name, dtor: None }
    }
}

struct HandleState {
    ptr: *mut c_void,
    closed: bool,
}

// SAFETY: the pointer is opaque to us and only handed out under the lock
unsafe impl Send for HandleState {}
unsafe impl Sync for HandleState {}

/// A lock-guarded native pointer with a one-shot release.
pub struct Handle {
    state: RwLock<HandleState>,
    tab: HandleTab,
}

impl Handle {
    /// Takes ownership of `ptr`, returns `None` for a null pointer.
    ///
    /// # Safety
    /// `ptr` must be valid for the destructor in `tab` and must not be released by anyone else.
    pub unsafe fn new(ptr: *mut c_void, tab: HandleTab) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self::from_non_null(ptr, tab))
    }

    /// # Safety
    /// Same contract as [`Handle::new`].
    pub unsafe fn from_non_null(ptr: NonNull<c_void>, tab: HandleTab) -> Self {
        Self {
            state: RwLock::new(HandleState {
                ptr: ptr.as_ptr(),
                closed: false,
            }),
            tab,
        }
    }

    #[inline]
    pub fn tab(&self) -> &HandleTab {
        &self.tab
    }

    /// Acquires the shared lock, the pointer stays valid for the lifetime of the guard.
    pub fn read(&self) -> Result<HandleGuard<'_>> {
        let guard = self.state.read();

        if guard.ptr.is_null() || guard.closed {
            return Err(Error::ClosedObject);
        }

        Ok(HandleGuard(guard))
    }

    /// Returns the pointer after briefly taking the shared lock.
    pub fn pointer(&self) -> Result<*mut c_void> {
        self.read().map(|guard| guard.as_ptr())
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Runs the destructor and nulls the pointer.
    ///
    /// Calling this on an already closed handle is a no-op. Fails instead of
    /// blocking when the handle is currently borrowed.
    pub fn close(&self) -> Result<()> {
        let Some(mut state) = self.state.try_write() else {
            return Err(Error::RecursiveLock("close"));
        };

        if state.ptr.is_null() {
            return Ok(());
        }

        if let Some(dtor) = self.tab.dtor {
            trace!(kind = self.tab.name, "closing handle");
            // SAFETY: the pointer is live (non-null, not released) and nobody holds the lock
            unsafe { dtor(state.ptr) };
        }

        state.ptr = null_mut();
        state.closed = true;

        Ok(())
    }

    /// Releases ownership of the pointer without running the destructor.
    ///
    /// Used when the pointer is handed to the native side, which becomes responsible for it.
    pub fn disarm(&self) -> Result<*mut c_void> {
        let Some(mut state) = self.state.try_write() else {
            return Err(Error::RecursiveLock("disarm"));
        };

        if state.ptr.is_null() || state.closed {
            return Err(Error::DisarmClosed);
        }

        trace!(kind = self.tab.name, "disarming handle");

        let ptr = state.ptr;
        state.ptr = null_mut();
        state.closed = true;

        Ok(ptr)
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &self.tab.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        if state.closed || state.ptr.is_null() {
            return;
        }

        warn!(kind = self.tab.name, "handle dropped without close, releasing in finalizer");

        if let Some(dtor) = self.tab.dtor {
            // SAFETY: exclusive access through &mut self and the pointer is still armed
            unsafe { dtor(state.ptr) };
        }

        state.ptr = null_mut();
        state.closed = true;
    }
}

/// Shared access to a live handle's pointer.
pub struct HandleGuard<'a>(RwLockReadGuard<'a, HandleState>);

impl HandleGuard<'_> {
    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.ptr
    }

    #[inline]
    pub fn cast<T>(&self) -> *mut T {
        self.0.ptr.cast()
    }
}
