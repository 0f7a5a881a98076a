//! Typed wrappers over managed handles.
//!
//! Every engine object is a [`Handle`] shared between clones of its wrapper, together
//! with the [`Lua`] that owns it. Work on an object read-locks both the VM and the
//! object, so neither can be released while a native call is in flight.

use std::{
    any::Any,
    ffi::c_void,
    fmt::{Debug, Display},
    ptr::{null_mut, NonNull},
    sync::{Arc, Weak},
};

use crate::{
    callback::{HostFunction, Interrupt},
    chunk::CompilerOpts,
    error::{Error, Result},
    ffi::{
        callback::ForeignCallback,
        engine::{engine_result, EngineApi, RawValue, RawValueList, RawValueTag},
        string::move_string_from_c,
    },
    handle::{Handle, HandleGuard, HandleTab},
    multivalue::MultiValue,
    userdata::{userdata_dtor, userdata_is, Userdata, UserdataRef, UserdataRefMut},
};

/// Destructor tables for the object kinds the engine hands out.
#[derive(Debug, Clone, Copy)]
pub struct ObjectTabs {
    pub string: HandleTab,
    pub table: HandleTab,
    pub function: HandleTab,
    pub thread: HandleTab,
    pub buffer: HandleTab,
    pub userdata: HandleTab,
}

struct LuaInner {
    object: Handle,
    tabs: ObjectTabs,
    api: &'static EngineApi,
}

/// A handle to a native Luau VM.
///
/// Clones refer to the same VM; closing any of them closes it for all.
#[derive(Clone)]
pub struct Lua {
    inner: Arc<LuaInner>,
}

/// A non-owning reference to a [`Lua`], held by callbacks that live inside the VM.
#[derive(Clone)]
pub(crate) struct WeakLua(Weak<LuaInner>);

impl WeakLua {
    pub(crate) fn upgrade(&self) -> Option<Lua> {
        self.0.upgrade().map(|inner| Lua { inner })
    }
}

impl Lua {
    /// Takes ownership of a native VM pointer.
    ///
    /// # Safety
    /// `ptr` must be a live VM for `vm_tab`'s destructor, the object tabs must match the
    /// engine's release functions and `api` must be the engine's function table for it.
    pub unsafe fn from_raw(
        ptr: *mut c_void,
        vm_tab: HandleTab,
        tabs: ObjectTabs,
        api: &'static EngineApi,
    ) -> Result<Self> {
        let object = Handle::new(ptr, vm_tab).ok_or(Error::NullPointer("Lua VM"))?;

        Ok(Self {
            inner: Arc::new(LuaInner { object, tabs, api }),
        })
    }

    /// Read-locks the VM for the duration of `f`.
    pub fn with_ptr<R>(&self, op: &'static str, f: impl FnOnce(*mut c_void) -> R) -> Result<R> {
        let guard = self.guard(op)?;
        Ok(f(guard.as_ptr()))
    }

    pub(crate) fn with_engine<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&'static EngineApi, *mut c_void) -> R,
    ) -> Result<R> {
        let guard = self.guard(op)?;
        Ok(f(self.inner.api, guard.as_ptr()))
    }

    fn guard(&self, op: &'static str) -> Result<HandleGuard<'_>> {
        self.inner.object.read().map_err(|_| Error::VmClosed(op))
    }

    pub fn close(&self) -> Result<()> {
        self.inner.object.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.object.is_closed()
    }

    /// True if both refer to the same VM.
    pub fn same_vm(&self, other: &Lua) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn tabs(&self) -> &ObjectTabs {
        &self.inner.tabs
    }

    pub(crate) fn downgrade(&self) -> WeakLua {
        WeakLua(Arc::downgrade(&self.inner))
    }

    /// # Safety
    /// `ptr` must be an owned string handle of this VM.
    pub unsafe fn wrap_string(&self, ptr: *mut c_void) -> Option<LuaString> {
        LuaString::wrap(self, ptr, self.inner.tabs.string)
    }

    /// # Safety
    /// `ptr` must be an owned table handle of this VM.
    pub unsafe fn wrap_table(&self, ptr: *mut c_void) -> Option<LuaTable> {
        LuaTable::wrap(self, ptr, self.inner.tabs.table)
    }

    /// # Safety
    /// `ptr` must be an owned function handle of this VM.
    pub unsafe fn wrap_function(&self, ptr: *mut c_void) -> Option<LuaFunction> {
        LuaFunction::wrap(self, ptr, self.inner.tabs.function)
    }

    /// # Safety
    /// `ptr` must be an owned thread handle of this VM.
    pub unsafe fn wrap_thread(&self, ptr: *mut c_void) -> Option<LuaThread> {
        LuaThread::wrap(self, ptr, self.inner.tabs.thread)
    }

    /// # Safety
    /// `ptr` must be an owned buffer handle of this VM.
    pub unsafe fn wrap_buffer(&self, ptr: *mut c_void) -> Option<LuaBuffer> {
        LuaBuffer::wrap(self, ptr, self.inner.tabs.buffer)
    }

    /// # Safety
    /// `ptr` must be an owned userdata handle of this VM.
    pub unsafe fn wrap_userdata(&self, ptr: *mut c_void) -> Option<LuaUserData> {
        LuaUserData::wrap(self, ptr, self.inner.tabs.userdata)
    }

    /// The global table.
    pub fn globals(&self) -> Result<LuaTable> {
        let ptr = self.with_engine("get globals", |api, vm| unsafe { (api.globals)(vm) })?;
        unsafe { self.wrap_table(ptr) }.ok_or(Error::NullPointer("globals"))
    }

    pub fn create_string(&self, bytes: impl AsRef<[u8]>) -> Result<LuaString> {
        let bytes = bytes.as_ref();
        let ptr = self.with_engine("create string", |api, vm| unsafe {
            (api.create_string)(vm, bytes.as_ptr(), bytes.len())
        })?;

        unsafe { self.wrap_string(ptr) }.ok_or(Error::NullPointer("string"))
    }

    pub fn create_table(&self) -> Result<LuaTable> {
        let ptr = self.with_engine("create table", |api, vm| unsafe { (api.create_table)(vm) })?;
        unsafe { self.wrap_table(ptr) }.ok_or(Error::NullPointer("table"))
    }

    /// A zero-filled buffer of `len` bytes.
    pub fn create_buffer(&self, len: usize) -> Result<LuaBuffer> {
        let ptr =
            self.with_engine("create buffer", |api, vm| unsafe { (api.create_buffer)(vm, len) })?;
        unsafe { self.wrap_buffer(ptr) }.ok_or(Error::NullPointer("buffer"))
    }

    /// Exposes `func` to Luau. The engine owns the callback from here on.
    pub fn create_function(&self, func: HostFunction) -> Result<LuaFunction> {
        let callback = func.into_foreign(self);
        let ptr = self.with_engine("create function", |api, vm| unsafe {
            (api.create_function)(vm, callback)
        })?;

        unsafe { self.wrap_function(ptr) }.ok_or(Error::NullPointer("function"))
    }

    /// Moves `value` into a userdata owned by this VM.
    ///
    /// The engine runs the payload destructor when the userdata is collected.
    pub fn create_userdata<T: Any + Send + Sync>(&self, value: T) -> Result<LuaUserData> {
        let ptr = self.with_engine("create userdata", |api, vm| {
            let payload = Userdata::into_raw(value);
            unsafe { (api.create_userdata)(vm, payload, userdata_dtor) }
        })?;

        unsafe { self.wrap_userdata(ptr) }.ok_or(Error::NullPointer("userdata"))
    }

    pub fn create_error(&self, bytes: impl Into<Vec<u8>>) -> ErrorVariant {
        ErrorVariant::new(bytes)
    }

    /// Compiler settings used for chunks loaded without their own.
    pub fn set_compiler_opts(&self, opts: &CompilerOpts) -> Result<()> {
        let raw = opts.to_raw();
        self.with_engine("set compiler options", |api, vm| unsafe {
            (api.set_compiler_opts)(vm, raw.as_ptr())
        })
    }

    /// Installs `interrupt`, replacing any previous one.
    pub fn set_interrupt(&self, interrupt: Interrupt) -> Result<()> {
        let callback = interrupt.into_foreign(self);
        self.with_engine("set interrupt", |api, vm| unsafe { (api.set_interrupt)(vm, callback) })
    }

    pub fn remove_interrupt(&self) -> Result<()> {
        let empty = ForeignCallback {
            callback: None,
            drop: None,
            handle: null_mut(),
        };

        self.with_engine("remove interrupt", |api, vm| unsafe { (api.set_interrupt)(vm, empty) })
    }
}

impl Debug for Lua {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lua").field("closed", &self.is_closed()).finish()
    }
}

macro_rules! lua_object {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            object: Arc<Handle>,
            lua: Lua,
        }

        impl $name {
            unsafe fn wrap(lua: &Lua, ptr: *mut c_void, tab: HandleTab) -> Option<Self> {
                Handle::new(ptr, tab).map(|handle| Self {
                    object: Arc::new(handle),
                    lua: lua.clone(),
                })
            }

            #[inline]
            pub fn lua(&self) -> &Lua {
                &self.lua
            }

            /// Runs `f` with the native pointer while the VM and the object are read-locked.
            pub fn with_ptr<R>(
                &self,
                op: &'static str,
                f: impl FnOnce(*mut c_void) -> R,
            ) -> Result<R> {
                let _vm = self.lua.guard(op)?;
                let guard = self.object.read()?;

                Ok(f(guard.as_ptr()))
            }

            /// Like `with_ptr`, also handing out the engine table and the VM pointer.
            pub(crate) fn with_engine<R>(
                &self,
                op: &'static str,
                f: impl FnOnce(&'static EngineApi, *mut c_void, *mut c_void) -> R,
            ) -> Result<R> {
                let vm = self.lua.guard(op)?;
                let guard = self.object.read()?;

                Ok(f(self.lua.inner.api, vm.as_ptr(), guard.as_ptr()))
            }

            /// A second owned engine reference to this object; the wrapper stays usable.
            pub(crate) fn to_raw(&self) -> Result<RawValue> {
                let ptr = self.with_engine("pass value", |api, vm, ptr| unsafe {
                    (api.clone_ref)(vm, RawValueTag::$variant, ptr)
                })?;

                if ptr.is_null() {
                    return Err(Error::NullPointer(ValueType::$variant.name()));
                }

                Ok(RawValue::pointer(RawValueTag::$variant, ptr))
            }

            /// Address of the native object, only useful for hashing and debugging.
            ///
            /// Returns 0 when the object or its VM is closed.
            pub fn pointer(&self) -> usize {
                self.with_ptr("get pointer", |ptr| ptr as usize).unwrap_or(0)
            }

            /// Reference equality within the same VM.
            pub fn equals(&self, other: &Self) -> bool {
                if !self.lua.same_vm(&other.lua) {
                    return false;
                }

                let lhs = self.pointer();
                lhs != 0 && lhs == other.pointer()
            }

            pub fn close(&self) -> Result<()> {
                self.object.close()
            }

            pub fn is_closed(&self) -> bool {
                self.object.is_closed()
            }

            /// Gives up ownership so the pointer can be handed back to the engine.
            pub fn into_raw(self) -> Result<*mut c_void> {
                self.object.disarm()
            }

            pub fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.pointer() {
                    0 => write!(f, "<closed {}>", stringify!($name)),
                    ptr => write!(f, "<{} 0x{:x}>", stringify!($name), ptr),
                }
            }
        }

        impl From<$name> for Value {
            fn from(value: $name) -> Self {
                Value::$variant(value)
            }
        }
    };
}

lua_object!(
    /// A string owned by the engine.
    LuaString,
    String
);
lua_object!(
    /// A table owned by the engine.
    LuaTable,
    Table
);
lua_object!(
    /// A Luau or host function owned by the engine.
    LuaFunction,
    Function
);
lua_object!(LuaThread, Thread);
lua_object!(LuaBuffer, Buffer);
lua_object!(
    /// A userdata owned by the engine, usually carrying a host payload.
    LuaUserData,
    UserData
);

impl LuaString {
    /// Copies the string contents out.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.with_engine("read string", |api, vm, string| unsafe {
            let mut len = 0;
            let ptr = (api.string_bytes)(vm, string, &mut len);

            if ptr.is_null() {
                Vec::new()
            } else {
                std::slice::from_raw_parts(ptr, len).to_vec()
            }
        })
    }

    pub fn to_string_lossy(&self) -> Result<String> {
        self.bytes().map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}

impl LuaTable {
    /// Reads `table[key]`, metamethods included.
    pub fn get(&self, key: impl Into<Value>) -> Result<Value> {
        let key = key.into();

        self.with_engine("get table field", |api, vm, table| {
            let key = self.lua.value_to_raw(&key)?;
            let mut out = RawValue::nil();

            unsafe {
                engine_result((api.table_get)(vm, table, key, &mut out))?;
                Ok(self.lua.value_from_raw(out))
            }
        })?
    }

    /// Writes `table[key] = value`, metamethods included.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let (key, value) = (key.into(), value.into());

        self.with_engine("set table field", |api, vm, table| {
            let key = self.lua.value_to_raw(&key)?;
            let value = match self.lua.value_to_raw(&value) {
                Ok(value) => value,
                Err(err) => {
                    unsafe { self.lua.release_raw(key) };
                    return Err(err);
                }
            };

            unsafe { engine_result((api.table_set)(vm, table, key, value)) }
        })?
    }

    /// Length of the array part, as the `#` operator sees it.
    pub fn len(&self) -> Result<usize> {
        self.with_engine("get table length", |api, vm, table| unsafe {
            (api.table_len)(vm, table)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        let pairs = self.pairs()?;
        let empty = pairs.is_empty();

        for (key, value) in pairs {
            key.close()?;
            value.close()?;
        }

        Ok(empty)
    }

    /// Snapshot of every key/value pair.
    pub fn pairs(&self) -> Result<Vec<(Value, Value)>> {
        self.with_engine("iterate table", |api, vm, table| {
            let out = RawValueList::new().into_raw();
            let err = unsafe { (api.table_pairs)(vm, table, out) };
            let mut values = unsafe { self.lua.values_from_list(RawValueList::from_raw(out)) };

            if let Err(err) = unsafe { engine_result(err) } {
                values.close()?;
                return Err(err);
            }

            let mut pairs = Vec::with_capacity(values.len() / 2);
            while let (Some(key), Some(value)) = (values.pop_front(), values.pop_front()) {
                pairs.push((key, value));
            }

            Ok(pairs)
        })?
    }

    /// Calls `f` for every pair, stopping at the first error.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Value, Value) -> Result<()>,
    {
        let mut pairs = self.pairs()?.into_iter();

        for (key, value) in pairs.by_ref() {
            if let Err(err) = f(key, value) {
                for (key, value) in pairs {
                    let _ = key.close();
                    let _ = value.close();
                }
                return Err(err);
            }
        }

        Ok(())
    }

    pub fn metatable(&self) -> Result<Option<LuaTable>> {
        let ptr = self.with_engine("get metatable", |api, vm, table| unsafe {
            (api.table_metatable)(vm, table)
        })?;

        Ok(unsafe { self.lua.wrap_table(ptr) })
    }

    /// Replaces the metatable, `None` clears it.
    pub fn set_metatable(&self, metatable: Option<&LuaTable>) -> Result<()> {
        self.with_engine("set metatable", |api, vm, table| {
            let metatable = match metatable {
                Some(mt) => {
                    if !mt.lua.same_vm(&self.lua) {
                        return Err(Error::ForeignVm("table"));
                    }
                    // SAFETY: to_raw always yields the pointer variant
                    unsafe { mt.to_raw()?.data.pointer }
                }
                None => null_mut(),
            };

            unsafe { engine_result((api.table_set_metatable)(vm, table, metatable)) }
        })?
    }
}

impl LuaFunction {
    /// Calls the function with `args`, returning every result.
    pub fn call(&self, args: MultiValue) -> Result<MultiValue> {
        self.with_engine("call function", |api, vm, func| {
            let args = self.lua.list_from_values(&args)?.into_raw();
            let results = RawValueList::new().into_raw();

            let err = unsafe { (api.function_call)(vm, func, args, results) };
            let values = unsafe { self.lua.values_from_list(RawValueList::from_raw(results)) };

            match unsafe { move_string_from_c(err) } {
                Some(msg) => {
                    values.close()?;
                    Err(Error::Native(msg))
                }
                None => Ok(values),
            }
        })?
    }

    /// The environment table, `None` for host functions.
    pub fn environment(&self) -> Result<Option<LuaTable>> {
        let ptr = self.with_engine("get environment", |api, vm, func| unsafe {
            (api.function_environment)(vm, func)
        })?;

        Ok(unsafe { self.lua.wrap_table(ptr) })
    }
}

impl LuaBuffer {
    pub fn len(&self) -> Result<usize> {
        self.with_engine("get buffer length", |api, vm, buf| unsafe {
            (api.buffer_len)(vm, buf)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn check_range(
        api: &EngineApi,
        vm: *mut c_void,
        buf: *mut c_void,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        let size = unsafe { (api.buffer_len)(vm, buf) };

        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(Error::OutOfBounds { offset, len, size }),
        }
    }

    /// Copies `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.with_engine("read buffer", |api, vm, buf| {
            Self::check_range(api, vm, buf, offset, len)?;

            let mut out = vec![0u8; len];
            unsafe { (api.buffer_read)(vm, buf, offset, out.as_mut_ptr(), len) };
            Ok(out)
        })?
    }

    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.with_engine("write buffer", |api, vm, buf| {
            Self::check_range(api, vm, buf, offset, data.len())?;

            unsafe { (api.buffer_write)(vm, buf, offset, data.as_ptr(), data.len()) };
            Ok(())
        })?
    }

    /// The whole buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.read_bytes(0, self.len()?)
    }
}

impl LuaUserData {
    /// Read-locks the userdata and asks the engine for its host payload.
    fn payload(&self, op: &'static str) -> Result<(HandleGuard<'_>, *mut c_void)> {
        let vm = self.lua.guard(op)?;
        let guard = self.object.read()?;
        let payload = unsafe { (self.lua.inner.api.userdata_payload)(vm.as_ptr(), guard.as_ptr()) };

        Ok((guard, payload))
    }

    /// True if the payload holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.payload("inspect userdata")
            .map(|(_, payload)| !payload.is_null() && unsafe { userdata_is::<T>(payload) })
            .unwrap_or(false)
    }

    pub fn borrow<T: Any>(&self) -> Result<UserdataRef<'_, T>> {
        let (guard, payload) = self.payload("borrow userdata")?;
        UserdataRef::try_from_guard(guard, payload).map_err(Error::from)
    }

    pub fn borrow_mut<T: Any>(&self) -> Result<UserdataRefMut<'_, T>> {
        let (guard, payload) = self.payload("borrow userdata")?;
        UserdataRefMut::try_from_guard(guard, payload).map_err(Error::from)
    }
}

const ERROR_TAB: HandleTab = HandleTab::new("error", drop_error_bytes);

unsafe extern "C-unwind" fn drop_error_bytes(ptr: *mut c_void) {
    drop(Box::from_raw(ptr.cast::<Vec<u8>>()));
}

/// An error message travelling as a value.
///
/// The bytes are host-owned and released through the same handle lifecycle as engine objects.
#[derive(Clone)]
pub struct ErrorVariant {
    object: Arc<Handle>,
}

impl ErrorVariant {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let boxed = Box::new(bytes.into());
        let ptr = NonNull::from(Box::leak(boxed)).cast::<c_void>();

        // SAFETY: freshly leaked box released only by drop_error_bytes
        let handle = unsafe { Handle::from_non_null(ptr, ERROR_TAB) };

        Self {
            object: Arc::new(handle),
        }
    }

    /// Copies the message out, `None` once closed.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        let guard = self.object.read().ok()?;
        // SAFETY: the guard keeps the Vec alive
        Some(unsafe { (*guard.cast::<Vec<u8>>()).clone() })
    }

    pub fn to_string_lossy(&self) -> String {
        self.bytes()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    pub fn equals(&self, other: &ErrorVariant) -> bool {
        self.to_string_lossy() == other.to_string_lossy()
    }

    pub fn close(&self) -> Result<()> {
        self.object.close()
    }

    pub fn is_closed(&self) -> bool {
        self.object.is_closed()
    }
}

impl Display for ErrorVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Debug for ErrorVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorVariant").field(&self.to_string_lossy()).finish()
    }
}

/// A light userdata pointer; the engine never releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightUserData(pub *mut c_void);

// SAFETY: only carried around, never dereferenced by this crate
unsafe impl Send for LightUserData {}
unsafe impl Sync for LightUserData {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Nil,
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

impl ValueType {
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Boolean => "boolean",
            ValueType::LightUserData => "lightuserdata",
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::Vector => "vector",
            ValueType::String => "string",
            ValueType::Table => "table",
            ValueType::Function => "function",
            ValueType::Thread => "thread",
            ValueType::UserData => "userdata",
            ValueType::Buffer => "buffer",
            ValueType::Error => "error",
            ValueType::Other => "other",
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Any value that can cross between the host and the engine.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    LightUserData(LightUserData),
    Integer(i64),
    Number(f64),
    Vector([f32; 3]),
    String(LuaString),
    Table(LuaTable),
    Function(LuaFunction),
    Thread(LuaThread),
    UserData(LuaUserData),
    Buffer(LuaBuffer),
    Error(ErrorVariant),
    /// A value of a type the binding does not model
    Other,
}

impl Value {
    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Boolean(_) => ValueType::Boolean,
            Value::LightUserData(_) => ValueType::LightUserData,
            Value::Integer(_) => ValueType::Integer,
            Value::Number(_) => ValueType::Number,
            Value::Vector(_) => ValueType::Vector,
            Value::String(_) => ValueType::String,
            Value::Table(_) => ValueType::Table,
            Value::Function(_) => ValueType::Function,
            Value::Thread(_) => ValueType::Thread,
            Value::UserData(_) => ValueType::UserData,
            Value::Buffer(_) => ValueType::Buffer,
            Value::Error(_) => ValueType::Error,
            Value::Other => ValueType::Other,
        }
    }

    /// The owning VM for engine objects.
    pub fn lua(&self) -> Option<&Lua> {
        match self {
            Value::String(v) => Some(v.lua()),
            Value::Table(v) => Some(v.lua()),
            Value::Function(v) => Some(v.lua()),
            Value::Thread(v) => Some(v.lua()),
            Value::UserData(v) => Some(v.lua()),
            Value::Buffer(v) => Some(v.lua()),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Value::String(v) => v.is_closed(),
            Value::Table(v) => v.is_closed(),
            Value::Function(v) => v.is_closed(),
            Value::Thread(v) => v.is_closed(),
            Value::UserData(v) => v.is_closed(),
            Value::Buffer(v) => v.is_closed(),
            Value::Error(v) => v.is_closed(),
            _ => false,
        }
    }

    /// Releases the underlying handle, a no-op for plain values.
    pub fn close(&self) -> Result<()> {
        match self {
            Value::String(v) => v.close(),
            Value::Table(v) => v.close(),
            Value::Function(v) => v.close(),
            Value::Thread(v) => v.close(),
            Value::UserData(v) => v.close(),
            Value::Buffer(v) => v.close(),
            Value::Error(v) => v.close(),
            _ => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<ErrorVariant> for Value {
    fn from(value: ErrorVariant) -> Self {
        Value::Error(value)
    }
}
