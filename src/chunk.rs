use std::{
    ffi::{c_char, CString},
    ptr::{null, null_mut},
};

use crate::{
    error::{Error, Result},
    ffi::{
        engine::{engine_result, RawChunk, RawChunkMode, RawCompilerOpts, RawStrList},
        string::c_string,
    },
    value::{Lua, LuaFunction, LuaTable},
};

/// How the chunk contents should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkMode {
    /// Luau source text
    #[default]
    Text,
    /// Precompiled Luau bytecode
    Binary,
}

/// Compiler settings forwarded to the engine when a text chunk is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerOpts {
    optimization_level: u8,
    debug_level: u8,
    type_info_level: u8,
    coverage_level: u8,
    vector_lib: Option<String>,
    vector_ctor: Option<String>,
    vector_type: Option<String>,
    mutable_globals: Vec<String>,
    userdata_types: Vec<String>,
    disabled_builtins: Vec<String>,
}

impl CompilerOpts {
    pub fn new() -> Self {
        Self {
            optimization_level: 1,
            debug_level: 1,
            type_info_level: 0,
            coverage_level: 0,
            vector_lib: None,
            vector_ctor: None,
            vector_type: None,
            mutable_globals: Vec::new(),
            userdata_types: Vec::new(),
            disabled_builtins: Vec::new(),
        }
    }

    /// How hard the engine optimizes loaded chunks.
    ///
    /// `0` turns optimization off. `1`, the default, keeps every chunk debuggable.
    /// `2` also inlines, which makes stack traces less precise.
    #[must_use]
    pub const fn set_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    /// How much debug information loaded chunks carry.
    ///
    /// `0` strips it. `1`, the default, keeps the line numbers and function names that
    /// error messages from a required module need. `2` adds local and upvalue names.
    #[must_use]
    pub const fn set_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    /// Which chunks get type information for native code generation.
    ///
    /// `0`, the default, limits it to modules marked native. `1` covers every chunk.
    #[must_use]
    pub const fn set_type_info_level(mut self, level: u8) -> Self {
        self.type_info_level = level;
        self
    }

    /// Coverage instrumentation for loaded chunks.
    ///
    /// `0`, the default, adds none. `1` counts statements. `2` counts expressions as well.
    #[must_use]
    pub const fn set_coverage_level(mut self, level: u8) -> Self {
        self.coverage_level = level;
        self
    }

    #[must_use]
    pub fn set_vector_lib(mut self, lib: impl Into<String>) -> Self {
        self.vector_lib = Some(lib.into());
        self
    }

    #[must_use]
    pub fn set_vector_ctor(mut self, ctor: impl Into<String>) -> Self {
        self.vector_ctor = Some(ctor.into());
        self
    }

    #[must_use]
    pub fn set_vector_type(mut self, r#type: impl Into<String>) -> Self {
        self.vector_type = Some(r#type.into());
        self
    }

    /// Globals a module may reassign at runtime.
    ///
    /// Field reads through these are never cached at load time.
    #[must_use]
    pub fn set_mutable_globals(mut self, globals: Vec<String>) -> Self {
        self.mutable_globals = globals;
        self
    }

    /// Host userdata type names the engine should know when it records type information.
    #[must_use]
    pub fn set_userdata_types(mut self, types: Vec<String>) -> Self {
        self.userdata_types = types;
        self
    }

    /// Builtins (`math.abs`, `tonumber`) that loaded chunks must look up at runtime.
    #[must_use]
    pub fn set_disabled_builtins(mut self, libs: Vec<String>) -> Self {
        self.disabled_builtins = libs;
        self
    }

    pub fn optimization_level(&self) -> u8 {
        self.optimization_level
    }

    pub fn debug_level(&self) -> u8 {
        self.debug_level
    }

    pub fn type_info_level(&self) -> u8 {
        self.type_info_level
    }

    pub fn coverage_level(&self) -> u8 {
        self.coverage_level
    }

    pub fn vector_lib(&self) -> Option<&str> {
        self.vector_lib.as_deref()
    }

    pub fn vector_ctor(&self) -> Option<&str> {
        self.vector_ctor.as_deref()
    }

    pub fn vector_type(&self) -> Option<&str> {
        self.vector_type.as_deref()
    }

    pub fn mutable_globals(&self) -> &[String] {
        &self.mutable_globals
    }

    pub fn userdata_types(&self) -> &[String] {
        &self.userdata_types
    }

    pub fn disabled_builtins(&self) -> &[String] {
        &self.disabled_builtins
    }
}

impl Default for CompilerOpts {
    fn default() -> Self {
        Self::new()
    }
}

/// [`CompilerOpts`] in the engine's layout, owning every string the record points at.
pub struct CompilerOptsBuf {
    raw: RawCompilerOpts,
    _strings: Vec<CString>,
    _lists: [Vec<*const c_char>; 3],
}

impl CompilerOptsBuf {
    /// Valid for as long as `self` is.
    pub fn as_ptr(&self) -> *const RawCompilerOpts {
        &self.raw
    }
}

impl CompilerOpts {
    pub fn to_raw(&self) -> CompilerOptsBuf {
        let mut strings = Vec::new();
        let mut keep = |s: &str| {
            let s = c_string(s);
            let ptr = s.as_ptr();
            strings.push(s);
            ptr
        };

        let vector_lib = self.vector_lib.as_deref().map_or(null(), &mut keep);
        let vector_ctor = self.vector_ctor.as_deref().map_or(null(), &mut keep);
        let vector_type = self.vector_type.as_deref().map_or(null(), &mut keep);

        let lists = [&self.mutable_globals, &self.userdata_types, &self.disabled_builtins]
            .map(|list| list.iter().map(|s| keep(s.as_str())).collect::<Vec<_>>());
        let str_list = |i: usize| RawStrList {
            ptr: lists[i].as_ptr(),
            len: lists[i].len(),
        };

        let raw = RawCompilerOpts {
            optimization_level: self.optimization_level,
            debug_level: self.debug_level,
            type_info_level: self.type_info_level,
            coverage_level: self.coverage_level,
            vector_lib,
            vector_ctor,
            vector_type,
            mutable_globals: str_list(0),
            userdata_types: str_list(1),
            disabled_builtins: str_list(2),
        };

        CompilerOptsBuf {
            raw,
            _strings: strings,
            _lists: lists,
        }
    }
}

/// A chunk to be loaded by the engine.
#[derive(Clone)]
pub struct ChunkOpts {
    pub name: String,
    pub code: Vec<u8>,
    pub mode: ChunkMode,
    /// Environment table of the loaded function, the VM globals when `None`.
    pub env: Option<LuaTable>,
    /// Compiler settings, the VM defaults when `None`.
    pub compiler: Option<CompilerOpts>,
}

impl ChunkOpts {
    pub fn text(name: impl Into<String>, code: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            mode: ChunkMode::Text,
            env: None,
            compiler: None,
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: Option<LuaTable>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: CompilerOpts) -> Self {
        self.compiler = Some(compiler);
        self
    }
}

impl From<ChunkMode> for RawChunkMode {
    fn from(mode: ChunkMode) -> Self {
        match mode {
            ChunkMode::Text => RawChunkMode::Text,
            ChunkMode::Binary => RawChunkMode::Binary,
        }
    }
}

/// Turns chunks into callable functions.
pub trait ChunkLoader {
    /// The VM functions are loaded into.
    fn lua(&self) -> &Lua;

    fn load_chunk(&self, opts: ChunkOpts) -> Result<LuaFunction>;
}

impl ChunkLoader for Lua {
    fn lua(&self) -> &Lua {
        self
    }

    fn load_chunk(&self, opts: ChunkOpts) -> Result<LuaFunction> {
        let name = c_string(&opts.name);
        let compiler = opts.compiler.as_ref().map(CompilerOpts::to_raw);
        let mut function = null_mut();

        let err = self.with_engine("load chunk", |api, vm| {
            let env = match &opts.env {
                Some(env) if !env.lua().same_vm(self) => return Err(Error::ForeignVm("table")),
                // SAFETY: to_raw always yields the pointer variant
                Some(env) => unsafe { env.to_raw()?.data.pointer },
                None => null_mut(),
            };

            let chunk = RawChunk {
                name: name.as_ptr(),
                code: opts.code.as_ptr(),
                code_len: opts.code.len(),
                mode: opts.mode.into(),
                env,
                compiler: compiler.as_ref().map_or(null(), CompilerOptsBuf::as_ptr),
            };

            Ok(unsafe { (api.load_chunk)(vm, &chunk, &mut function) })
        })??;

        let loaded = unsafe { self.wrap_function(function) };
        if let Err(err) = unsafe { engine_result(err) } {
            if let Some(func) = loaded {
                func.close()?;
            }
            return Err(err);
        }

        loaded.ok_or(Error::NullPointer("function"))
    }
}
