use super::{vfs::Vfs, NavigateError, NavigationResult};

pub const SUFFIXES: [&str; 2] = [".luau", ".lua"];
pub const INIT_SUFFIXES: [&str; 2] = ["/init.luau", "/init.lua"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct NavState {
    real_path: String,
    absolute_real_path: String,
    absolute_path_prefix: String,
    module_path: String,
    absolute_module_path: String,
}

impl NavState {
    fn root() -> Self {
        Self {
            real_path: "/".into(),
            absolute_real_path: "/".into(),
            absolute_path_prefix: String::new(),
            module_path: "/".into(),
            absolute_module_path: "/".into(),
        }
    }

    fn stdin() -> Self {
        Self {
            real_path: "./stdin".into(),
            absolute_real_path: "/stdin".into(),
            absolute_path_prefix: String::new(),
            module_path: "./stdin".into(),
            absolute_module_path: "/stdin".into(),
        }
    }
}

fn strip_module_suffix(path: &str) -> Option<&str> {
    INIT_SUFFIXES
        .iter()
        .chain(SUFFIXES.iter())
        .find_map(|suffix| path.strip_suffix(suffix))
}

fn path_prefix(path: &str) -> String {
    path.find('/').map(|idx| path[..idx].to_string()).unwrap_or_default()
}

/// A cursor over a [`Vfs`] that tracks the module being resolved.
///
/// Every mutating operation either lands on a location that exists or leaves the
/// cursor where it was.
#[derive(Debug)]
pub struct VfsNavigator<V> {
    vfs: V,
    state: NavState,
}

impl<V: Vfs> VfsNavigator<V> {
    pub fn new(vfs: V) -> Self {
        Self {
            vfs,
            state: NavState::root(),
        }
    }

    pub fn vfs(&self) -> &V {
        &self.vfs
    }

    /// Resolves a module path to a file or directory, trying the known suffixes.
    ///
    /// Init modules are joined without doubling the separator, so the root resolves to
    /// `/init.luau` however it was reached.
    pub fn get_real_path(&self, module_path: &str) -> Result<String, NavigateError> {
        let last_component = module_path
            .rfind('/')
            .map_or(module_path, |idx| &module_path[idx + 1..]);
        let directory = module_path.trim_end_matches('/');
        let mut found: Option<String> = None;

        if last_component != "init" {
            for candidate in SUFFIXES {
                let path = format!("{module_path}{candidate}");
                if self.vfs.is_file(&path) {
                    if found.is_some() {
                        return Err(NavigateError::Ambiguous);
                    }
                    found = Some(path);
                }
            }
        }

        if self.vfs.is_dir(module_path) {
            if found.is_some() {
                return Err(NavigateError::Ambiguous);
            }

            for candidate in INIT_SUFFIXES {
                let path = format!("{directory}{candidate}");
                if self.vfs.is_file(&path) {
                    if found.is_some() {
                        return Err(NavigateError::Ambiguous);
                    }
                    found = Some(path);
                }
            }

            // a directory is a valid place to stand even without an init module
            return Ok(found.unwrap_or_else(|| module_path.to_string()));
        }

        found.ok_or(NavigateError::NotFound)
    }

    /// Splits a file path into `(file_path, module_path)`.
    ///
    /// The module path has the drive prefix removed and exactly one module suffix stripped.
    pub fn get_module_path(&self, file_path: &str) -> (String, String) {
        let file_path = file_path.replace('\\', "/");
        let mut view = file_path.as_str();

        if self.vfs.is_absolute_path(view) {
            if let Some(idx) = view.find('/') {
                view = &view[idx..];
            }
        }

        let view = strip_module_suffix(view).unwrap_or(view);
        let module_path = if view == "." { String::new() } else { view.to_string() };

        (file_path, module_path)
    }

    fn resolve(&self, mut state: NavState) -> Result<NavState, NavigateError> {
        let relative = self.get_real_path(&state.module_path);
        let absolute = self.get_real_path(&state.absolute_module_path);

        let (resolved, resolved_absolute) = (relative?, absolute?);

        state.real_path = if self.vfs.is_absolute_path(&resolved) {
            format!("{}{resolved}", state.absolute_path_prefix)
        } else {
            resolved
        };
        state.absolute_real_path = format!("{}{resolved_absolute}", state.absolute_path_prefix);

        Ok(state)
    }

    fn commit(&mut self, candidate: NavState) -> NavigationResult {
        self.state = self.resolve(candidate)?;
        Ok(())
    }

    pub fn reset_to_stdin(&mut self) -> NavigationResult {
        self.state = NavState::stdin();
        Ok(())
    }

    pub fn reset_to_path(&mut self, path: &str) -> NavigationResult {
        let normalized = self.vfs.normalize_path(path);
        let mut candidate = self.state.clone();

        if self.vfs.is_absolute_path(&normalized) {
            let (file_path, module_path) = self.get_module_path(&normalized);

            candidate.absolute_module_path = module_path.clone();
            candidate.module_path = module_path;
            candidate.absolute_path_prefix = path_prefix(&file_path);
        } else {
            let cwd = self.vfs.cwd();
            let (file_path, module_path) = self.get_module_path(&normalized);
            let joined = self.vfs.normalize_path(&self.vfs.join(&[&cwd, &file_path]));
            let (joined, absolute_module_path) = self.get_module_path(&joined);

            candidate.module_path = module_path;
            candidate.absolute_module_path = absolute_module_path;
            candidate.absolute_path_prefix = path_prefix(&joined);
        }

        // rooted modules
        for module_path in [&mut candidate.module_path, &mut candidate.absolute_module_path] {
            if module_path.is_empty() {
                *module_path = "/".into();
            }
        }

        self.commit(candidate)
    }

    pub fn to_parent(&mut self) -> NavigationResult {
        let current = &self.state.absolute_module_path;
        let mut candidate = self.state.clone();

        if current.is_empty() {
            return Err(NavigateError::NotFound);
        }

        // the root's parent is the empty module path
        if current == "/" {
            candidate.module_path.clear();
            candidate.absolute_module_path.clear();
            return self.commit(candidate);
        }

        match current.matches('/').count() {
            0 => Err(NavigateError::Other(format!("module path {current:?} has no parent"))),
            1 => {
                candidate.module_path.clear();
                candidate.absolute_module_path.clear();
                self.commit(candidate)
            }
            _ => {
                candidate.module_path = self
                    .vfs
                    .normalize_path(&self.vfs.join(&[&candidate.module_path, ".."]));
                candidate.absolute_module_path = self
                    .vfs
                    .normalize_path(&self.vfs.join(&[&candidate.absolute_module_path, ".."]));
                self.commit(candidate)
            }
        }
    }

    pub fn to_child(&mut self, name: &str) -> NavigationResult {
        let mut candidate = self.state.clone();

        candidate.module_path = self
            .vfs
            .normalize_path(&self.vfs.join(&[&candidate.module_path, name]));
        candidate.absolute_module_path = self
            .vfs
            .normalize_path(&self.vfs.join(&[&candidate.absolute_module_path, name]));

        self.commit(candidate)
    }

    /// Path of the current module including its suffix.
    pub fn file_path(&self) -> &str {
        &self.state.real_path
    }

    pub fn absolute_file_path(&self) -> &str {
        &self.state.absolute_real_path
    }

    pub fn module_path(&self) -> &str {
        &self.state.module_path
    }

    pub fn absolute_module_path(&self) -> &str {
        &self.state.absolute_module_path
    }

    /// Where the `.luaurc` for the current module would live.
    pub fn luaurc_path(&self) -> String {
        let real_path = self.file_path();
        let directory = strip_module_suffix(real_path).unwrap_or(real_path);

        self.vfs.join(&[directory, ".luaurc"])
    }
}
