//! Require-by-string module resolution.
//!
//! The engine drives resolution through the [`Require`] contract: it resets to the
//! requiring chunk, walks with [`Require::to_parent`] and [`Require::to_child`] and then asks
//! for a cache key and a loader. [`SimpleRequirer`] implements the contract on top of a
//! [`Vfs`] using the [`VfsNavigator`].

use thiserror::Error;

use crate::{callback::CallbackPanic, chunk::ChunkLoader, error::Result, value::LuaFunction};

pub mod config;
pub mod navigator;
pub mod path;
pub mod requirer;
pub mod vfs;

pub use config::RequirerConfig;
pub use navigator::VfsNavigator;
pub use requirer::SimpleRequirer;
#[cfg(feature = "fs")]
pub use vfs::DirVfs;
pub use vfs::{MemoryVfs, Vfs};

/// Why a navigation step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigateError {
    #[error("ambiguous module path")]
    Ambiguous,
    #[error("module not found")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

impl From<CallbackPanic> for NavigateError {
    fn from(panic: CallbackPanic) -> Self {
        NavigateError::Other(panic.0)
    }
}

/// `Ok(())` when the step landed on a valid location.
pub type NavigationResult = std::result::Result<(), NavigateError>;

/// The contract the engine uses to resolve `require` calls.
pub trait Require {
    /// Whether `require` may be called from the given chunk.
    fn is_require_allowed(&self, chunk_name: &str) -> bool;

    /// Points the context at the requiring chunk.
    fn reset(&mut self, chunk_name: &str) -> NavigationResult;

    /// Points the context at an aliased path taken verbatim from a config file.
    ///
    /// Only called when the alias cannot be resolved relative to its config file.
    fn jump_to_alias(&mut self, path: &str) -> NavigationResult;

    fn to_parent(&mut self) -> NavigationResult;

    fn to_child(&mut self, name: &str) -> NavigationResult;

    /// Whether the context currently points at a module.
    fn has_module(&self) -> bool;

    /// Key the loaded module is cached under, only called when [`Require::has_module`] is true.
    fn cache_key(&self) -> String;

    /// Whether a `.luaurc` exists for the current context.
    fn has_config(&self) -> bool;

    /// Contents of the `.luaurc`, only called when [`Require::has_config`] is true.
    fn config(&self) -> std::io::Result<Vec<u8>>;

    /// A function that runs the current module and returns its result.
    fn loader(&self, loader: &dyn ChunkLoader) -> Result<LuaFunction>;
}
