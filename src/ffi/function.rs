//! Host functions and interrupts as engine callbacks.
//!
//! The engine fills a [`FunctionCallbackData`] or [`InterruptData`] record and invokes
//! the [`ForeignCallback`] built here. Failures, panics included, come back as an owned
//! error string in the record and never unwind into the engine.

use std::{
    ffi::{c_char, c_void},
    ptr::null_mut,
};

use super::{callback::ForeignCallback, engine::RawValueList, string::to_c_string};
use crate::{
    callback::{wrap_failable, HostFunction, Interrupt, VmState},
    error::{Error, Result},
    value::{Lua, WeakLua},
};

/// One call of a host function.
#[repr(C)]
pub struct FunctionCallbackData {
    /// The calling VM or thread, as the engine sees it.
    pub lua: *mut c_void,
    /// Arguments, owned by the callee from the start of the call.
    pub args: *mut RawValueList,
    /// Results set by the callee, owned by the engine afterwards.
    pub values: *mut RawValueList,
    /// Set instead of `values` when the call failed.
    pub error: *mut c_char,
}

/// One poll of an interrupt.
#[repr(C)]
pub struct InterruptData {
    pub lua: *mut c_void,
    pub state: VmState,
    pub error: *mut c_char,
}

fn upgrade(lua: &WeakLua, op: &'static str) -> Result<Lua> {
    lua.upgrade().ok_or(Error::VmClosed(op))
}

impl HostFunction {
    /// Adapts the function to the engine's calling convention.
    ///
    /// The callback keeps only a weak reference to `lua`, the VM owns the callback.
    pub fn into_foreign(self, lua: &Lua) -> ForeignCallback {
        let lua = lua.downgrade();

        ForeignCallback::new(move |ptr: *mut c_void| {
            // SAFETY: function callbacks are only ever filled with FunctionCallbackData
            let data = unsafe { &mut *ptr.cast::<FunctionCallbackData>() };
            let args = std::mem::replace(&mut data.args, null_mut());

            let results: Result<RawValueList> = wrap_failable(|| {
                // SAFETY: the engine hands the argument list over with the call
                let args = unsafe { RawValueList::from_raw(args) };
                let lua = upgrade(&lua, "call host function")?;
                let args = unsafe { lua.values_from_list(args) };

                let values = self.call(&lua, args)?;
                let list = lua.list_from_values(&values);
                values.close()?;
                list
            });

            match results {
                Ok(list) => data.values = list.into_raw(),
                Err(err) => data.error = to_c_string(err.to_string()),
            }
        })
    }
}

impl Interrupt {
    /// Adapts the interrupt to the engine's calling convention.
    pub fn into_foreign(self, lua: &Lua) -> ForeignCallback {
        let lua = lua.downgrade();

        ForeignCallback::new(move |ptr: *mut c_void| {
            // SAFETY: interrupt callbacks are only ever filled with InterruptData
            let data = unsafe { &mut *ptr.cast::<InterruptData>() };

            let state: Result<VmState> =
                wrap_failable(|| self.poll(&upgrade(&lua, "poll interrupt")?));

            match state {
                Ok(state) => data.state = state,
                Err(err) => data.error = to_c_string(err.to_string()),
            }
        })
    }
}
