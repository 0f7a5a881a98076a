//! Host-side plumbing for Luau bindings: require-by-string resolution, managed native
//! handles and the callback boundary to the engine.
//!
//! The engine itself is reached through the C ABI in [`ffi`], chiefly the [`EngineApi`]
//! table it hands over with each VM. Nothing here interprets Luau.

pub mod callback;
pub mod chunk;
pub mod error;
pub mod ffi;
pub mod handle;
mod marshal;
pub mod multivalue;
pub mod require;
mod userdata;
pub mod value;

pub use callback::{wrap_failable, CallbackPanic, Errorable, HostFunction, Interrupt, VmState};
pub use chunk::{ChunkLoader, ChunkMode, ChunkOpts, CompilerOpts, CompilerOptsBuf};
pub use error::{Error, Result};
pub use ffi::engine::EngineApi;
pub use handle::{Destructor, Handle, HandleGuard, HandleTab};
pub use multivalue::MultiValue;
#[cfg(feature = "fs")]
pub use require::DirVfs;
pub use require::{
    MemoryVfs, NavigateError, NavigationResult, Require, RequirerConfig, SimpleRequirer, Vfs,
    VfsNavigator,
};
pub use userdata::{UserdataBorrowError, UserdataRef, UserdataRefMut};
pub use value::{
    ErrorVariant, LightUserData, Lua, LuaBuffer, LuaFunction, LuaString, LuaTable, LuaThread,
    LuaUserData, ObjectTabs, Value, ValueType,
};
