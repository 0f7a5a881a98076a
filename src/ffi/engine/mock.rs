//! An in-process engine with just enough table, function and buffer semantics to drive
//! the wrappers in tests.
//!
//! References are boxed `Arc`s, so every clone and release the host performs is real.

use std::{
    ffi::{c_char, c_void},
    mem::ManuallyDrop,
    ptr::{null, null_mut},
    sync::Arc,
};

use parking_lot::Mutex;

use super::{
    EngineApi, RawChunk, RawCompilerOpts, RawStrList, RawValue, RawValueList, RawValueTag,
};
use crate::{
    callback::VmState,
    ffi::{
        callback::ForeignCallback,
        function::{FunctionCallbackData, InterruptData},
        string::{borrow_str, move_string_from_c, to_c_string},
    },
    handle::{Destructor, HandleTab},
    value::{Lua, ObjectTabs},
};

type ScriptFn = Box<dyn Fn(Vec<Val>) -> Result<Vec<Val>, String> + Send + Sync>;

enum Body {
    Host(ForeignCallback),
    Script(ScriptFn),
}

#[derive(Default)]
struct MockTable {
    entries: Vec<(Val, Val)>,
    metatable: Option<Arc<Obj>>,
}

impl MockTable {
    fn get(&self, key: &Val) -> Val {
        self.entries
            .iter()
            .find(|(k, _)| k.same_key(key))
            .map_or(Val::Nil, |(_, v)| v.clone())
    }

    fn set(&mut self, key: Val, value: Val) {
        self.entries.retain(|(k, _)| !k.same_key(&key));

        if !matches!(value, Val::Nil) {
            self.entries.push((key, value));
        }
    }
}

enum Obj {
    Str(Vec<u8>),
    Table(Mutex<MockTable>),
    Func { body: Body, env: Option<Arc<Obj>> },
    Buffer(Mutex<Vec<u8>>),
    UserData { payload: *mut c_void, dtor: Destructor },
}

// SAFETY: userdata payloads are Send + Sync host values, everything else is owned data
unsafe impl Send for Obj {}
unsafe impl Sync for Obj {}

impl Drop for Obj {
    fn drop(&mut self) {
        if let Obj::UserData { payload, dtor } = self {
            unsafe { (*dtor)(*payload) };
        }
    }
}

#[derive(Clone)]
enum Val {
    Nil,
    Bool(bool),
    Int(i64),
    Num(f64),
    Vector([f32; 3]),
    Light(*mut c_void),
    Ref(RawValueTag, Arc<Obj>),
    Error(Vec<u8>),
    Other,
}

impl Val {
    fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Val::Ref(RawValueTag::String, Arc::new(Obj::Str(bytes.into())))
    }

    /// Takes ownership of `raw`.
    unsafe fn from_raw(raw: RawValue) -> Self {
        let data = raw.data;

        match raw.tag {
            RawValueTag::Nil => Val::Nil,
            RawValueTag::Boolean => Val::Bool(data.boolean),
            RawValueTag::LightUserData => Val::Light(data.pointer),
            RawValueTag::Integer => Val::Int(data.integer),
            RawValueTag::Number => Val::Num(data.number),
            RawValueTag::Vector => Val::Vector(data.vector),
            RawValueTag::Error => {
                Val::Error(ManuallyDrop::into_inner(data.bytes).into_vec().unwrap_or_default())
            }
            RawValueTag::Other => Val::Other,
            _ if data.pointer.is_null() => Val::Nil,
            tag => Val::Ref(tag, *Box::from_raw(data.pointer.cast::<Arc<Obj>>())),
        }
    }

    fn into_raw(self) -> RawValue {
        match self {
            Val::Nil => RawValue::nil(),
            Val::Bool(b) => RawValue::boolean(b),
            Val::Int(i) => RawValue::integer(i),
            Val::Num(n) => RawValue::number(n),
            Val::Vector(v) => RawValue::vector(v),
            Val::Light(p) => RawValue::pointer(RawValueTag::LightUserData, p),
            Val::Ref(tag, obj) => RawValue::pointer(tag, new_ref(obj)),
            Val::Error(bytes) => RawValue::error(bytes),
            Val::Other => RawValue::other(),
        }
    }

    fn same_key(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Int(a), Val::Num(b)) | (Val::Num(b), Val::Int(a)) => *a as f64 == *b,
            (Val::Light(a), Val::Light(b)) => a == b,
            (Val::Ref(_, a), Val::Ref(_, b)) => match (&**a, &**b) {
                (Obj::Str(x), Obj::Str(y)) => x == y,
                _ => Arc::ptr_eq(a, b),
            },
            _ => false,
        }
    }
}

fn new_ref(obj: Arc<Obj>) -> *mut c_void {
    Box::into_raw(Box::new(obj)).cast()
}

unsafe fn obj<'a>(ptr: *mut c_void) -> &'a Arc<Obj> {
    &*ptr.cast::<Arc<Obj>>()
}

unsafe fn take_ref(ptr: *mut c_void) -> Option<Arc<Obj>> {
    (!ptr.is_null()).then(|| *Box::from_raw(ptr.cast::<Arc<Obj>>()))
}

unsafe fn take_all(mut list: RawValueList) -> Vec<Val> {
    let mut values = Vec::with_capacity(list.len());
    while let Some(raw) = list.pop() {
        values.push(Val::from_raw(raw));
    }

    values
}

unsafe extern "C-unwind" fn release_ref(ptr: *mut c_void) {
    drop(Box::from_raw(ptr.cast::<Arc<Obj>>()));
}

/// Compiler settings as the engine received them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedOpts {
    pub optimization_level: u8,
    pub debug_level: u8,
    pub vector_lib: Option<String>,
    pub mutable_globals: Vec<String>,
}

impl RecordedOpts {
    unsafe fn read(raw: &RawCompilerOpts) -> Self {
        let optional = |ptr: *const c_char| (!ptr.is_null()).then(|| borrow_str(ptr));

        Self {
            optimization_level: raw.optimization_level,
            debug_level: raw.debug_level,
            vector_lib: optional(raw.vector_lib),
            mutable_globals: read_list(&raw.mutable_globals),
        }
    }
}

unsafe fn read_list(list: &RawStrList) -> Vec<String> {
    (0..list.len).map(|i| borrow_str(*list.ptr.add(i))).collect()
}

struct MockVm {
    globals: Arc<Obj>,
    interrupt: Mutex<Option<Arc<ForeignCallback>>>,
    compiler: Mutex<Option<RecordedOpts>>,
}

unsafe fn vm<'a>(ptr: *mut c_void) -> &'a MockVm {
    &*ptr.cast::<MockVm>()
}

unsafe extern "C-unwind" fn drop_vm(ptr: *mut c_void) {
    drop(Box::from_raw(ptr.cast::<MockVm>()));
}

const VM_TAB: HandleTab = HandleTab::new("mock vm", drop_vm);

pub(crate) const MOCK_TABS: ObjectTabs = ObjectTabs {
    string: HandleTab::new("string", release_ref),
    table: HandleTab::new("table", release_ref),
    function: HandleTab::new("function", release_ref),
    thread: HandleTab::new("thread", release_ref),
    buffer: HandleTab::new("buffer", release_ref),
    userdata: HandleTab::new("userdata", release_ref),
};

fn error(msg: &str) -> *mut c_char {
    to_c_string(msg)
}

unsafe fn poll(vm: &MockVm, lua: *mut c_void) -> Option<InterruptData> {
    let interrupt = vm.interrupt.lock().clone()?;

    Some(interrupt.fill(InterruptData {
        lua,
        state: VmState::Continue,
        error: null_mut(),
    }))
}

unsafe extern "C-unwind" fn clone_ref(
    _: *mut c_void,
    _: RawValueTag,
    object: *mut c_void,
) -> *mut c_void {
    new_ref(obj(object).clone())
}

unsafe extern "C-unwind" fn globals(ptr: *mut c_void) -> *mut c_void {
    new_ref(vm(ptr).globals.clone())
}

unsafe extern "C-unwind" fn create_string(
    _: *mut c_void,
    bytes: *const u8,
    len: usize,
) -> *mut c_void {
    let bytes = match len {
        0 => Vec::new(),
        len => std::slice::from_raw_parts(bytes, len).to_vec(),
    };
    new_ref(Arc::new(Obj::Str(bytes)))
}

unsafe extern "C-unwind" fn create_table(_: *mut c_void) -> *mut c_void {
    new_ref(Arc::new(Obj::Table(Mutex::default())))
}

unsafe extern "C-unwind" fn create_buffer(_: *mut c_void, len: usize) -> *mut c_void {
    new_ref(Arc::new(Obj::Buffer(Mutex::new(vec![0; len]))))
}

unsafe extern "C-unwind" fn create_function(
    _: *mut c_void,
    callback: ForeignCallback,
) -> *mut c_void {
    new_ref(Arc::new(Obj::Func {
        body: Body::Host(callback),
        env: None,
    }))
}

unsafe extern "C-unwind" fn create_userdata(
    _: *mut c_void,
    payload: *mut c_void,
    dtor: Destructor,
) -> *mut c_void {
    new_ref(Arc::new(Obj::UserData { payload, dtor }))
}

/// Every chunk compiles to a function returning its name, its code and the optimization
/// level it was compiled with. Code starting with `error` fails to compile.
unsafe extern "C-unwind" fn load_chunk(
    ptr: *mut c_void,
    chunk: *const RawChunk,
    function: *mut *mut c_void,
) -> *mut c_char {
    let chunk = &*chunk;
    let env = take_ref(chunk.env);
    let name = borrow_str(chunk.name);
    let code = match chunk.code_len {
        0 => Vec::new(),
        len => std::slice::from_raw_parts(chunk.code, len).to_vec(),
    };

    if code.starts_with(b"error") {
        return error(&format!("{name}:1: syntax error"));
    }

    let level = match chunk.compiler.as_ref() {
        Some(opts) => opts.optimization_level,
        None => vm(ptr).compiler.lock().as_ref().map_or(1, |opts| opts.optimization_level),
    };

    let script: ScriptFn = Box::new(move |_| {
        Ok(vec![Val::string(name.clone()), Val::string(code.clone()), Val::Int(level.into())])
    });

    *function = new_ref(Arc::new(Obj::Func {
        body: Body::Script(script),
        env,
    }));
    null_mut()
}

unsafe extern "C-unwind" fn set_compiler_opts(ptr: *mut c_void, opts: *const RawCompilerOpts) {
    *vm(ptr).compiler.lock() = opts.as_ref().map(|opts| RecordedOpts::read(opts));
}

unsafe extern "C-unwind" fn set_interrupt(ptr: *mut c_void, callback: ForeignCallback) {
    *vm(ptr).interrupt.lock() = callback.callback.is_some().then(|| Arc::new(callback));
}

unsafe extern "C-unwind" fn string_bytes(
    _: *mut c_void,
    string: *mut c_void,
    len: *mut usize,
) -> *const u8 {
    match &**obj(string) {
        Obj::Str(bytes) => {
            *len = bytes.len();
            bytes.as_ptr()
        }
        _ => {
            *len = 0;
            null()
        }
    }
}

fn lookup(table: &Arc<Obj>, key: &Val) -> Option<Val> {
    let Obj::Table(table) = &**table else {
        return None;
    };

    let (value, metatable) = {
        let table = table.lock();
        (table.get(key), table.metatable.clone())
    };

    if !matches!(value, Val::Nil) {
        return Some(value);
    }

    // one level of __index tables
    let index = metatable.and_then(|mt| lookup(&mt, &Val::string("__index")));
    match index {
        Some(Val::Ref(RawValueTag::Table, index)) => lookup(&index, key),
        _ => Some(Val::Nil),
    }
}

unsafe extern "C-unwind" fn table_get(
    _: *mut c_void,
    table: *mut c_void,
    key: RawValue,
    out: *mut RawValue,
) -> *mut c_char {
    let key = Val::from_raw(key);

    match lookup(obj(table), &key) {
        Some(value) => {
            out.write(value.into_raw());
            null_mut()
        }
        None => error("attempt to index a non-table value"),
    }
}

unsafe extern "C-unwind" fn table_set(
    _: *mut c_void,
    table: *mut c_void,
    key: RawValue,
    value: RawValue,
) -> *mut c_char {
    let (key, value) = (Val::from_raw(key), Val::from_raw(value));

    let Obj::Table(table) = &**obj(table) else {
        return error("attempt to index a non-table value");
    };

    if matches!(key, Val::Nil) {
        return error("table index is nil");
    }

    table.lock().set(key, value);
    null_mut()
}

unsafe extern "C-unwind" fn table_len(_: *mut c_void, table: *mut c_void) -> usize {
    let Obj::Table(table) = &**obj(table) else {
        return 0;
    };

    let table = table.lock();
    (1..).take_while(|&i| !matches!(table.get(&Val::Int(i)), Val::Nil)).count()
}

unsafe extern "C-unwind" fn table_pairs(
    _: *mut c_void,
    table: *mut c_void,
    out: *mut RawValueList,
) -> *mut c_char {
    let Obj::Table(table) = &**obj(table) else {
        return error("attempt to iterate a non-table value");
    };

    let out = &mut *out;
    for (key, value) in table.lock().entries.iter().cloned() {
        out.push(key.into_raw());
        out.push(value.into_raw());
    }

    null_mut()
}

unsafe extern "C-unwind" fn table_metatable(_: *mut c_void, table: *mut c_void) -> *mut c_void {
    match &**obj(table) {
        Obj::Table(table) => table.lock().metatable.clone().map_or(null_mut(), new_ref),
        _ => null_mut(),
    }
}

unsafe extern "C-unwind" fn table_set_metatable(
    _: *mut c_void,
    table: *mut c_void,
    metatable: *mut c_void,
) -> *mut c_char {
    let metatable = take_ref(metatable);

    let Obj::Table(table) = &**obj(table) else {
        return error("attempt to set the metatable of a non-table value");
    };

    if metatable.as_ref().is_some_and(|mt| !matches!(&**mt, Obj::Table(_))) {
        return error("metatable must be a table");
    }

    table.lock().metatable = metatable;
    null_mut()
}

unsafe extern "C-unwind" fn function_call(
    ptr: *mut c_void,
    function: *mut c_void,
    args: *mut RawValueList,
    results: *mut RawValueList,
) -> *mut c_char {
    let args = RawValueList::from_raw(args);

    if let Some(err) = poll(vm(ptr), ptr).map(|data| data.error).filter(|e| !e.is_null()) {
        drop(take_all(args));
        return err;
    }

    let Obj::Func { body, .. } = &**obj(function) else {
        drop(take_all(args));
        return error("attempt to call a non-function value");
    };

    match body {
        Body::Host(callback) => {
            let data = callback.fill(FunctionCallbackData {
                lua: ptr,
                args: args.into_raw(),
                values: null_mut(),
                error: null_mut(),
            });

            drop(take_all(RawValueList::from_raw(data.args)));
            if !data.error.is_null() {
                drop(take_all(RawValueList::from_raw(data.values)));
                return data.error;
            }

            *results = RawValueList::from_raw(data.values);
            null_mut()
        }
        Body::Script(script) => match script(take_all(args)) {
            Ok(values) => {
                for value in values {
                    (*results).push(value.into_raw());
                }
                null_mut()
            }
            Err(msg) => error(&msg),
        },
    }
}

unsafe extern "C-unwind" fn function_environment(
    _: *mut c_void,
    function: *mut c_void,
) -> *mut c_void {
    match &**obj(function) {
        Obj::Func { env: Some(env), .. } => new_ref(env.clone()),
        _ => null_mut(),
    }
}

unsafe extern "C-unwind" fn buffer_len(_: *mut c_void, buffer: *mut c_void) -> usize {
    match &**obj(buffer) {
        Obj::Buffer(bytes) => bytes.lock().len(),
        _ => 0,
    }
}

unsafe extern "C-unwind" fn buffer_read(
    _: *mut c_void,
    buffer: *mut c_void,
    offset: usize,
    dst: *mut u8,
    len: usize,
) {
    if let Obj::Buffer(bytes) = &**obj(buffer) {
        let bytes = bytes.lock();
        std::ptr::copy_nonoverlapping(bytes[offset..offset + len].as_ptr(), dst, len);
    }
}

unsafe extern "C-unwind" fn buffer_write(
    _: *mut c_void,
    buffer: *mut c_void,
    offset: usize,
    src: *const u8,
    len: usize,
) {
    if let Obj::Buffer(bytes) = &**obj(buffer) {
        let mut bytes = bytes.lock();
        std::ptr::copy_nonoverlapping(src, bytes[offset..offset + len].as_mut_ptr(), len);
    }
}

unsafe extern "C-unwind" fn userdata_payload(
    _: *mut c_void,
    userdata: *mut c_void,
) -> *mut c_void {
    match &**obj(userdata) {
        Obj::UserData { payload, .. } => *payload,
        _ => null_mut(),
    }
}

pub(crate) static MOCK_API: EngineApi = EngineApi {
    clone_ref,
    globals,
    create_string,
    create_table,
    create_buffer,
    create_function,
    create_userdata,
    load_chunk,
    set_compiler_opts,
    set_interrupt,
    string_bytes,
    table_get,
    table_set,
    table_len,
    table_pairs,
    table_metatable,
    table_set_metatable,
    function_call,
    function_environment,
    buffer_len,
    buffer_read,
    buffer_write,
    userdata_payload,
};

/// A fresh VM on the in-process engine.
pub(crate) fn mock_lua() -> Lua {
    let vm = Box::new(MockVm {
        globals: Arc::new(Obj::Table(Mutex::default())),
        interrupt: Mutex::new(None),
        compiler: Mutex::new(None),
    });

    unsafe { Lua::from_raw(Box::into_raw(vm).cast(), VM_TAB, MOCK_TABS, &MOCK_API) }
        .expect("boxed vm is never null")
}

/// Polls the installed interrupt the way the engine does between instructions.
pub(crate) fn poll_interrupt(lua: &Lua) -> Option<(VmState, Option<String>)> {
    lua.with_ptr("poll interrupt", |ptr| unsafe {
        poll(vm(ptr), ptr).map(|data| (data.state, move_string_from_c(data.error)))
    })
    .ok()
    .flatten()
}

/// The VM-wide compiler settings last installed.
pub(crate) fn compiler_defaults(lua: &Lua) -> Option<RecordedOpts> {
    lua.with_ptr("read compiler options", |ptr| unsafe { vm(ptr).compiler.lock().clone() })
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, Arc};

    use super::{compiler_defaults, mock_lua, poll_interrupt};
    use crate::{
        callback::{HostFunction, Interrupt, VmState},
        chunk::CompilerOpts,
        error::Error,
        handle::tests::DropCounter,
        multivalue::MultiValue,
        value::Value,
    };

    #[test]
    fn strings_and_globals() {
        let lua = mock_lua();
        let s = lua.create_string("héllo").unwrap();
        assert_eq!(s.to_string_lossy().unwrap(), "héllo");
        assert!(lua.create_string("").unwrap().bytes().unwrap().is_empty());

        lua.globals().unwrap().set(s.clone(), 7).unwrap();
        assert!(matches!(lua.globals().unwrap().get(s.clone()).unwrap(), Value::Integer(7)));

        // keys compare by contents, not by reference
        let same = lua.create_string("héllo").unwrap();
        assert!(matches!(lua.globals().unwrap().get(same).unwrap(), Value::Integer(7)));

        s.close().unwrap();
        assert!(matches!(lua.globals().unwrap().get(s), Err(Error::ClosedObject)));
    }

    #[test]
    fn table_fields() {
        let lua = mock_lua();
        let t = lua.create_table().unwrap();
        assert!(t.is_empty().unwrap());

        t.set(1, true).unwrap();
        t.set(2, 2.5).unwrap();
        t.set(4, 4).unwrap();
        assert_eq!(t.len().unwrap(), 2);
        assert!(matches!(t.get(1).unwrap(), Value::Boolean(true)));
        assert!(matches!(t.get(2.0).unwrap(), Value::Number(n) if n == 2.5));
        assert!(matches!(t.get(3).unwrap(), Value::Nil));

        t.set(2, Value::Nil).unwrap();
        assert_eq!(t.len().unwrap(), 1);
        assert_eq!(t.pairs().unwrap().len(), 2);

        match t.set(Value::Nil, 1) {
            Err(Error::Native(msg)) => assert_eq!(msg, "table index is nil"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn for_each_stops_at_the_first_error() {
        let lua = mock_lua();
        let t = lua.create_table().unwrap();
        for i in 1..=3 {
            t.set(i, lua.create_table().unwrap()).unwrap();
        }

        let mut seen = 0;
        let res = t.for_each(|_, value| {
            seen += 1;
            value.close()?;
            Err(Error::Native("stop".to_string()))
        });

        assert!(matches!(res, Err(Error::Native(_))));
        assert_eq!(seen, 1);
    }

    #[test]
    fn metatables() {
        let lua = mock_lua();
        let t = lua.create_table().unwrap();
        let mt = lua.create_table().unwrap();
        let fallback = lua.create_table().unwrap();

        fallback.set(lua.create_string("x").unwrap(), 10).unwrap();
        mt.set(lua.create_string("__index").unwrap(), fallback).unwrap();

        assert!(t.metatable().unwrap().is_none());
        t.set_metatable(Some(&mt)).unwrap();
        assert!(t.metatable().unwrap().is_some());

        let key = lua.create_string("x").unwrap();
        assert!(matches!(t.get(key.clone()).unwrap(), Value::Integer(10)));

        t.set_metatable(None).unwrap();
        assert!(matches!(t.get(key).unwrap(), Value::Nil));

        let other = mock_lua();
        let foreign = other.create_table().unwrap();
        assert!(matches!(t.set_metatable(Some(&foreign)), Err(Error::ForeignVm("table"))));
    }

    #[test]
    fn host_functions_through_the_engine() {
        let lua = mock_lua();
        let add = lua
            .create_function(HostFunction::new(|_, args| {
                let mut out = MultiValue::new();
                out.push_back(args.integer_at(0)? + args.integer_at(1)?);
                Ok(out)
            }))
            .unwrap();

        let mut args = MultiValue::new();
        args.push_back(2);
        args.push_back(3);
        assert_eq!(add.call(args).unwrap().integer_at(0).unwrap(), 5);
        assert!(add.environment().unwrap().is_none());

        let bad = lua
            .create_function(HostFunction::new(|_, _| panic!("host function exploded")))
            .unwrap();
        match bad.call(MultiValue::new()) {
            Err(Error::Native(msg)) => assert_eq!(msg, "host function exploded"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn host_function_can_reenter_the_vm() {
        let lua = mock_lua();
        let make = lua
            .create_function(HostFunction::new(|lua, _| {
                let t = lua.create_table()?;
                t.set(1, lua.create_string("made")?)?;
                Ok(MultiValue::from(vec![t.into()]))
            }))
            .unwrap();

        let t = make.call(MultiValue::new()).unwrap().table_at(0).unwrap();
        match t.get(1).unwrap() {
            Value::String(s) => assert_eq!(s.bytes().unwrap(), b"made"),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn buffers() {
        let lua = mock_lua();
        let buf = lua.create_buffer(4).unwrap();

        assert_eq!(buf.len().unwrap(), 4);
        buf.write_bytes(1, &[7, 8]).unwrap();
        assert_eq!(buf.to_vec().unwrap(), [0, 7, 8, 0]);
        assert_eq!(buf.read_bytes(2, 2).unwrap(), [8, 0]);

        assert!(matches!(
            buf.write_bytes(3, &[1, 2]),
            Err(Error::OutOfBounds { offset: 3, len: 2, size: 4 })
        ));
        assert!(matches!(buf.read_bytes(usize::MAX, 2), Err(Error::OutOfBounds { .. })));
        assert!(lua.create_buffer(0).unwrap().is_empty().unwrap());
    }

    #[test]
    fn userdata_lives_as_long_as_the_engine_holds_it() {
        let lua = mock_lua();
        let drops = Arc::new(Default::default());
        let ud = lua.create_userdata(DropCounter(Arc::clone(&drops))).unwrap();

        let holder = lua.create_table().unwrap();
        holder.set(1, ud.clone()).unwrap();

        ud.close().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        match holder.get(1).unwrap() {
            Value::UserData(again) => {
                assert!(again.is::<DropCounter>());
                again.close().unwrap();
            }
            other => panic!("unexpected value {other:?}"),
        }

        holder.close().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interrupts() {
        let lua = mock_lua();
        assert!(poll_interrupt(&lua).is_none());

        lua.set_interrupt(Interrupt::new(|_| Ok(VmState::Yield))).unwrap();
        assert_eq!(poll_interrupt(&lua), Some((VmState::Yield, None)));

        lua.set_interrupt(Interrupt::new(|_| panic!("too slow"))).unwrap();
        let f = lua.create_function(HostFunction::new(|_, args| Ok(args))).unwrap();
        match f.call(MultiValue::new()) {
            Err(Error::Native(msg)) => assert_eq!(msg, "too slow"),
            other => panic!("unexpected result {other:?}"),
        }

        lua.remove_interrupt().unwrap();
        assert!(poll_interrupt(&lua).is_none());
        assert!(f.call(MultiValue::new()).unwrap().is_empty());
    }

    #[test]
    fn compiler_defaults_reach_the_engine() {
        let lua = mock_lua();
        assert!(compiler_defaults(&lua).is_none());

        let opts = CompilerOpts::new()
            .set_optimization_level(2)
            .set_vector_lib("vector")
            .set_mutable_globals(vec!["state".to_string(), "bad\0name".to_string()]);
        lua.set_compiler_opts(&opts).unwrap();

        let seen = compiler_defaults(&lua).unwrap();
        assert_eq!(seen.optimization_level, 2);
        assert_eq!(seen.debug_level, 1);
        assert_eq!(seen.vector_lib.as_deref(), Some("vector"));
        assert_eq!(seen.mutable_globals, ["state", "badname"]);
    }

    #[test]
    fn closed_vm_refuses_engine_calls() {
        let lua = mock_lua();
        let t = lua.create_table().unwrap();
        lua.close().unwrap();

        assert!(matches!(lua.globals(), Err(Error::VmClosed("get globals"))));
        assert!(matches!(t.len(), Err(Error::VmClosed("get table length"))));
        assert!(matches!(
            lua.set_interrupt(Interrupt::new(|_| Ok(VmState::Continue))),
            Err(Error::VmClosed(_))
        ));
        t.close().unwrap();
    }
}
