//! Host callbacks invoked by the engine.
//!
//! Panics must never unwind into the engine, so every callback runs under
//! [`wrap_failable`] and a panic is turned into the error value of its return type.

use std::{any::Any, panic::AssertUnwindSafe};

use tracing::error;

use crate::{error::Result, multivalue::MultiValue, value::Lua};

/// A panic recovered at the callback boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPanic(pub String);

/// Return types that have a way of expressing failure.
pub trait Errorable {
    fn error_variant(panic: CallbackPanic) -> Self;
}

impl Errorable for () {
    fn error_variant(_: CallbackPanic) -> Self {}
}

impl Errorable for bool {
    fn error_variant(_: CallbackPanic) -> Self {
        false
    }
}

impl Errorable for usize {
    fn error_variant(_: CallbackPanic) -> Self {
        0
    }
}

impl<T> Errorable for *mut T {
    fn error_variant(_: CallbackPanic) -> Self {
        std::ptr::null_mut()
    }
}

impl<T, E: From<CallbackPanic>> Errorable for std::result::Result<T, E> {
    fn error_variant(panic: CallbackPanic) -> Self {
        Err(E::from(panic))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic reason".to_string()
    }
}

/// Runs `f`, turning a panic into `T`'s error variant.
pub fn wrap_failable<T: Errorable>(f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(t) => t,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, "recovered panic in host callback");
            T::error_variant(CallbackPanic(message))
        }
    }
}

type HostFn = dyn Fn(&Lua, MultiValue) -> Result<MultiValue> + Send + Sync;

/// A Rust function callable from Luau.
pub struct HostFunction {
    func: Box<HostFn>,
}

impl HostFunction {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Lua, MultiValue) -> Result<MultiValue> + Send + Sync + 'static,
    {
        Self { func: Box::new(func) }
    }

    /// Invokes the function, a panic surfaces as [`crate::Error::Callback`].
    pub fn call(&self, lua: &Lua, args: MultiValue) -> Result<MultiValue> {
        wrap_failable(|| (self.func)(lua, args))
    }
}

/// What the VM should do after an interrupt returns.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmState {
    #[default]
    Continue,
    Yield,
}

/// Periodically polled by the engine while Luau code runs.
pub struct Interrupt {
    func: Box<dyn Fn(&Lua) -> Result<VmState> + Send + Sync>,
}

impl Interrupt {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Lua) -> Result<VmState> + Send + Sync + 'static,
    {
        Self { func: Box::new(func) }
    }

    pub fn poll(&self, lua: &Lua) -> Result<VmState> {
        wrap_failable(|| (self.func)(lua))
    }
}
