use tracing::debug;

use super::{
    config::RequirerConfig, navigator::VfsNavigator, vfs::Vfs, NavigateError, NavigationResult,
    Require,
};
use crate::{
    chunk::{ChunkLoader, ChunkOpts},
    error::Result,
    value::{LuaFunction, LuaTable},
};

/// Chunk name the engine uses for interactive input.
pub const REPL_CHUNK: &str = "=repl";

macro_rules! nav_debug {
    ($self:ident, $($arg:tt)+) => {
        if $self.config.debug {
            debug!($($arg)+);
        }
    };
}

/// A [`Require`] implementation resolving modules on a [`Vfs`].
pub struct SimpleRequirer<V> {
    navigator: VfsNavigator<V>,
    config: RequirerConfig,
    env: Option<LuaTable>,
}

impl<V: Vfs> SimpleRequirer<V> {
    pub fn new(vfs: V, config: RequirerConfig) -> Self {
        Self {
            navigator: VfsNavigator::new(vfs),
            config,
            env: None,
        }
    }

    /// Loaded modules get `env` as their environment instead of the VM globals.
    #[must_use]
    pub fn with_env(mut self, env: LuaTable) -> Self {
        self.env = Some(env);
        self
    }

    pub fn navigator(&self) -> &VfsNavigator<V> {
        &self.navigator
    }

    /// Settings this requirer was built with.
    ///
    /// Not to be confused with [`Require::config`], which reads the module's `.luaurc`.
    pub fn settings(&self) -> &RequirerConfig {
        &self.config
    }
}

impl<V: Vfs> Require for SimpleRequirer<V> {
    fn is_require_allowed(&self, _chunk_name: &str) -> bool {
        true
    }

    fn reset(&mut self, chunk_name: &str) -> NavigationResult {
        nav_debug!(self, chunk_name, "resetting require");

        if chunk_name == REPL_CHUNK {
            return self.navigator.reset_to_stdin();
        }

        self.navigator.reset_to_path(chunk_name)
    }

    fn jump_to_alias(&mut self, path: &str) -> NavigationResult {
        nav_debug!(self, path, "jumping to alias");

        if !self.navigator.vfs().is_absolute_path(path) {
            return Err(NavigateError::NotFound);
        }

        self.navigator.reset_to_path(path)
    }

    fn to_parent(&mut self) -> NavigationResult {
        nav_debug!(self, from = self.navigator.module_path(), "navigating to parent");
        self.navigator.to_parent()
    }

    fn to_child(&mut self, name: &str) -> NavigationResult {
        nav_debug!(self, from = self.navigator.module_path(), name, "navigating to child");
        self.navigator.to_child(name)
    }

    fn has_module(&self) -> bool {
        let path = self.navigator.file_path();
        nav_debug!(self, path, "checking for module");

        self.navigator.vfs().is_file(path)
    }

    fn cache_key(&self) -> String {
        format!("{}@{}", self.config.cache_prefix, self.navigator.absolute_file_path())
    }

    fn has_config(&self) -> bool {
        let path = self.navigator.luaurc_path();
        nav_debug!(self, path, "checking for config");

        self.navigator.vfs().is_file(&path)
    }

    fn config(&self) -> std::io::Result<Vec<u8>> {
        let path = self.navigator.luaurc_path();
        nav_debug!(self, path, "reading config");

        self.navigator.vfs().read(&path)
    }

    fn loader(&self, loader: &dyn ChunkLoader) -> Result<LuaFunction> {
        let chunk_name = self.navigator.absolute_file_path().to_string();
        nav_debug!(self, chunk_name, "loading module");

        let code = self.navigator.vfs().read(&chunk_name)?;

        loader.load_chunk(ChunkOpts::text(chunk_name, code).with_env(self.env.clone()))
    }
}
