//! The engine side of the C ABI.
//!
//! A native engine hands the host an [`EngineApi`] when a VM is wrapped with
//! [`Lua::from_raw`](crate::Lua::from_raw). Every wrapper operation goes through it.
//!
//! Values cross as [`RawValue`]s. An object pointer inside a value is an owned
//! reference: the side that receives it releases it, through the matching
//! [`ObjectTabs`](crate::ObjectTabs) destructor on the host or the engine's own
//! bookkeeping on the other side. Error strings returned by the engine are allocated with
//! [`luau_require_string_new`](super::string::luau_require_string_new) and freed by the host.

use std::{
    collections::VecDeque,
    ffi::{c_char, c_void},
    mem::ManuallyDrop,
};

use tracing::warn;

use super::{
    callback::ForeignCallback,
    string::{move_string_from_c, RawBytes},
};
use crate::{
    error::{Error, Result},
    handle::Destructor,
};

#[cfg(test)]
pub(crate) mod mock;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValueTag {
    Nil = 0,
    Boolean,
    LightUserData,
    Integer,
    Number,
    Vector,
    String,
    Table,
    Function,
    Thread,
    UserData,
    Buffer,
    Error,
    Other,
}

#[repr(C)]
pub union RawValueData {
    pub boolean: bool,
    pub integer: i64,
    pub number: f64,
    pub vector: [f32; 3],
    /// Light userdata address or an owned object reference.
    pub pointer: *mut c_void,
    /// Message of an error value.
    pub bytes: ManuallyDrop<RawBytes>,
}

/// A tagged value in C layout.
#[repr(C)]
pub struct RawValue {
    pub tag: RawValueTag,
    pub data: RawValueData,
}

impl RawValue {
    pub const fn nil() -> Self {
        Self {
            tag: RawValueTag::Nil,
            data: RawValueData { integer: 0 },
        }
    }

    pub const fn other() -> Self {
        Self {
            tag: RawValueTag::Other,
            data: RawValueData { integer: 0 },
        }
    }

    pub const fn boolean(b: bool) -> Self {
        Self {
            tag: RawValueTag::Boolean,
            data: RawValueData { boolean: b },
        }
    }

    pub const fn integer(i: i64) -> Self {
        Self {
            tag: RawValueTag::Integer,
            data: RawValueData { integer: i },
        }
    }

    pub const fn number(n: f64) -> Self {
        Self {
            tag: RawValueTag::Number,
            data: RawValueData { number: n },
        }
    }

    pub const fn vector(v: [f32; 3]) -> Self {
        Self {
            tag: RawValueTag::Vector,
            data: RawValueData { vector: v },
        }
    }

    /// A pointer-carrying value: light userdata or an owned object reference.
    pub const fn pointer(tag: RawValueTag, ptr: *mut c_void) -> Self {
        Self {
            tag,
            data: RawValueData { pointer: ptr },
        }
    }

    pub fn error(bytes: Vec<u8>) -> Self {
        Self {
            tag: RawValueTag::Error,
            data: RawValueData {
                bytes: ManuallyDrop::new(RawBytes::from_vec(bytes)),
            },
        }
    }

    /// True for tags whose pointer is an owned object reference.
    pub const fn is_object(&self) -> bool {
        matches!(
            self.tag,
            RawValueTag::String
                | RawValueTag::Table
                | RawValueTag::Function
                | RawValueTag::Thread
                | RawValueTag::UserData
                | RawValueTag::Buffer
        )
    }
}

/// An ordered list of owned values, used for call arguments and results.
///
/// The list is opaque to the engine, which works on it through the
/// `luau_value_list_*` exports.
#[derive(Default)]
pub struct RawValueList(VecDeque<RawValue>);

impl RawValueList {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self(VecDeque::with_capacity(cap))
    }

    pub fn push(&mut self, value: RawValue) {
        self.0.push_back(value);
    }

    pub fn pop(&mut self) -> Option<RawValue> {
        self.0.pop_front()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_raw(self) -> *mut RawValueList {
        Box::into_raw(Box::new(self))
    }

    /// Takes the list back, an empty list for null.
    ///
    /// # Safety
    /// `ptr` must come from [`RawValueList::into_raw`] or [`luau_value_list_new`] and not
    /// be used afterwards.
    pub unsafe fn from_raw(ptr: *mut RawValueList) -> Self {
        if ptr.is_null() {
            return Self::new();
        }

        *Box::from_raw(ptr)
    }
}

impl Drop for RawValueList {
    fn drop(&mut self) {
        let leaked = self.0.iter().filter(|v| v.is_object()).count();
        if leaked > 0 {
            warn!(leaked, "value list freed with unreleased object references");
        }

        for value in self.0.drain(..) {
            if value.tag == RawValueTag::Error {
                // SAFETY: the tag says the bytes field is active
                drop(unsafe { ManuallyDrop::into_inner(value.data.bytes).into_vec() });
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn luau_value_list_new(capacity: usize) -> *mut RawValueList {
    RawValueList::with_capacity(capacity).into_raw()
}

/// # Safety
/// `list` must be a live list from [`luau_value_list_new`].
#[no_mangle]
pub unsafe extern "C" fn luau_value_list_push(list: *mut RawValueList, value: RawValue) {
    if let Some(list) = list.as_mut() {
        list.push(value);
    }
}

/// Moves the first value into `out`, false once the list is empty.
///
/// # Safety
/// `list` must be a live list and `out` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn luau_value_list_pop(list: *mut RawValueList, out: *mut RawValue) -> bool {
    if out.is_null() {
        return false;
    }

    match list.as_mut().and_then(RawValueList::pop) {
        Some(value) => {
            out.write(value);
            true
        }
        None => false,
    }
}

/// # Safety
/// `list` must be a live list or null.
#[no_mangle]
pub unsafe extern "C" fn luau_value_list_len(list: *const RawValueList) -> usize {
    list.as_ref().map_or(0, RawValueList::len)
}

/// Frees the list. Object references still inside are not released.
///
/// # Safety
/// `list` must come from [`luau_value_list_new`] and not be freed already.
#[no_mangle]
pub unsafe extern "C" fn luau_value_list_free(list: *mut RawValueList) {
    drop(RawValueList::from_raw(list));
}

/// A borrowed array of C strings.
#[repr(C)]
pub struct RawStrList {
    pub ptr: *const *const c_char,
    pub len: usize,
}

/// Compiler settings in C layout; unset strings are null.
#[repr(C)]
pub struct RawCompilerOpts {
    pub optimization_level: u8,
    pub debug_level: u8,
    pub type_info_level: u8,
    pub coverage_level: u8,
    pub vector_lib: *const c_char,
    pub vector_ctor: *const c_char,
    pub vector_type: *const c_char,
    pub mutable_globals: RawStrList,
    pub userdata_types: RawStrList,
    pub disabled_builtins: RawStrList,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawChunkMode {
    Text = 0,
    Binary = 1,
}

/// A chunk to load; everything is borrowed except `env`.
#[repr(C)]
pub struct RawChunk {
    pub name: *const c_char,
    pub code: *const u8,
    pub code_len: usize,
    pub mode: RawChunkMode,
    /// Owned table reference, or null for the VM globals.
    pub env: *mut c_void,
    /// Null for the VM defaults.
    pub compiler: *const RawCompilerOpts,
}

type Vm = *mut c_void;
type Obj = *mut c_void;

/// Function table a native engine provides for one VM.
///
/// Functions returning `*mut c_char` report failure with an owned error string and
/// success with null.
#[repr(C)]
pub struct EngineApi {
    /// Makes a second owned reference to `object`.
    pub clone_ref: unsafe extern "C-unwind" fn(vm: Vm, tag: RawValueTag, object: Obj) -> Obj,
    pub globals: unsafe extern "C-unwind" fn(vm: Vm) -> Obj,

    pub create_string: unsafe extern "C-unwind" fn(vm: Vm, bytes: *const u8, len: usize) -> Obj,
    pub create_table: unsafe extern "C-unwind" fn(vm: Vm) -> Obj,
    pub create_buffer: unsafe extern "C-unwind" fn(vm: Vm, len: usize) -> Obj,
    /// Takes ownership of the callback, which receives a
    /// [`FunctionCallbackData`](super::function::FunctionCallbackData) per call.
    pub create_function: unsafe extern "C-unwind" fn(vm: Vm, callback: ForeignCallback) -> Obj,
    /// The engine calls `dtor` with `payload` once the userdata is collected.
    pub create_userdata:
        unsafe extern "C-unwind" fn(vm: Vm, payload: *mut c_void, dtor: Destructor) -> Obj,

    pub load_chunk: unsafe extern "C-unwind" fn(
        vm: Vm,
        chunk: *const RawChunk,
        function: *mut Obj,
    ) -> *mut c_char,
    pub set_compiler_opts: unsafe extern "C-unwind" fn(vm: Vm, opts: *const RawCompilerOpts),
    /// Replaces the interrupt; a callback without a function removes it.
    pub set_interrupt: unsafe extern "C-unwind" fn(vm: Vm, callback: ForeignCallback),

    /// Bytes of a string, valid while the reference is alive.
    pub string_bytes:
        unsafe extern "C-unwind" fn(vm: Vm, string: Obj, len: *mut usize) -> *const u8,

    pub table_get: unsafe extern "C-unwind" fn(
        vm: Vm,
        table: Obj,
        key: RawValue,
        out: *mut RawValue,
    ) -> *mut c_char,
    pub table_set: unsafe extern "C-unwind" fn(
        vm: Vm,
        table: Obj,
        key: RawValue,
        value: RawValue,
    ) -> *mut c_char,
    pub table_len: unsafe extern "C-unwind" fn(vm: Vm, table: Obj) -> usize,
    /// Pushes key and value alternately into `out`.
    pub table_pairs:
        unsafe extern "C-unwind" fn(vm: Vm, table: Obj, out: *mut RawValueList) -> *mut c_char,
    pub table_metatable: unsafe extern "C-unwind" fn(vm: Vm, table: Obj) -> Obj,
    /// Takes ownership of `metatable`; null clears it.
    pub table_set_metatable:
        unsafe extern "C-unwind" fn(vm: Vm, table: Obj, metatable: Obj) -> *mut c_char,

    /// Takes ownership of `args` and fills `results`.
    pub function_call: unsafe extern "C-unwind" fn(
        vm: Vm,
        function: Obj,
        args: *mut RawValueList,
        results: *mut RawValueList,
    ) -> *mut c_char,
    pub function_environment: unsafe extern "C-unwind" fn(vm: Vm, function: Obj) -> Obj,

    pub buffer_len: unsafe extern "C-unwind" fn(vm: Vm, buffer: Obj) -> usize,
    /// Callers keep `offset + len` within the buffer.
    pub buffer_read:
        unsafe extern "C-unwind" fn(vm: Vm, buffer: Obj, offset: usize, dst: *mut u8, len: usize),
    pub buffer_write:
        unsafe extern "C-unwind" fn(vm: Vm, buffer: Obj, offset: usize, src: *const u8, len: usize),

    /// Payload given to `create_userdata`, null for userdata the host did not create.
    pub userdata_payload: unsafe extern "C-unwind" fn(vm: Vm, userdata: Obj) -> *mut c_void,
}

/// Maps an engine error string to [`Error::Native`].
///
/// # Safety
/// `err` must be null or an owned string from the string exports.
pub unsafe fn engine_result(err: *mut c_char) -> Result<()> {
    match move_string_from_c(err) {
        Some(msg) => Err(Error::Native(msg)),
        None => Ok(()),
    }
}
