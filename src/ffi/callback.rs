use std::ffi::c_void;

use crate::callback::wrap_failable;

pub type CallbackFn = unsafe extern "C-unwind" fn(handle: *mut c_void, data: *mut c_void);
pub type CallbackDropFn = unsafe extern "C-unwind" fn(handle: *mut c_void);

/// A callback passed across the C ABI.
///
/// `callback` receives `handle` and a pointer to a request record it fills in;
/// `drop` releases `handle` once the callback is no longer needed.
#[repr(C)]
pub struct ForeignCallback {
    pub callback: Option<CallbackFn>,
    pub drop: Option<CallbackDropFn>,
    pub handle: *mut c_void,
}

// SAFETY: every callback is required to be callable from any thread, the ones built by
// ForeignCallback::new are Send + Sync closures
unsafe impl Send for ForeignCallback {}
unsafe impl Sync for ForeignCallback {}

impl ForeignCallback {
    /// Wraps a Rust closure.
    ///
    /// A panic inside it is recovered and logged before the trampoline returns.
    pub fn new<F: Fn(*mut c_void) + Send + Sync + 'static>(func: F) -> Self {
        unsafe extern "C-unwind" fn invoke_fn<T: Fn(*mut c_void)>(
            handle: *mut c_void,
            data: *mut c_void,
        ) {
            let func = handle.cast::<T>();

            wrap_failable(|| (*func)(data))
        }

        unsafe extern "C-unwind" fn drop_fn<T>(handle: *mut c_void) {
            drop(Box::from_raw(handle.cast::<T>()));
        }

        Self {
            callback: Some(invoke_fn::<F>),
            drop: Some(drop_fn::<F>),
            handle: Box::into_raw(Box::new(func)).cast(),
        }
    }

    /// Invokes the callback with a raw record pointer, a no-op without a callback.
    ///
    /// # Safety
    /// `data` must point to the record type the other side expects for this callback.
    pub unsafe fn call(&self, data: *mut c_void) {
        if let Some(callback) = self.callback {
            callback(self.handle, data);
        }
    }

    /// Moves `data` to the heap, lets the callback fill it in and hands it back.
    ///
    /// # Safety
    /// `R` must be the record type the other side expects for this callback.
    pub unsafe fn fill<R>(&self, data: R) -> R {
        let ptr = Box::into_raw(Box::new(data));
        self.call(ptr.cast());
        *Box::from_raw(ptr)
    }
}

impl Drop for ForeignCallback {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop.take() {
            // SAFETY: taken above, so the handle is released exactly once
            unsafe { drop_fn(self.handle) };
        }

        self.handle = std::ptr::null_mut();
    }
}
