//! Read-only filesystem capability used by the navigator.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
};

#[cfg(feature = "fs")]
use std::path::{Path, PathBuf};

use super::path;

/// What the navigator needs from a filesystem.
///
/// Paths are always `/`-separated; implementations normalize them before lookup.
pub trait Vfs {
    fn is_file(&self, path: &str) -> bool;

    /// Names of the entries in a directory.
    fn read_dir(&self, path: &str) -> io::Result<Vec<String>>;

    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    fn is_dir(&self, path: &str) -> bool {
        self.read_dir(path).is_ok()
    }

    /// Working directory relative paths are resolved against. Empty means the root.
    fn cwd(&self) -> String {
        String::new()
    }

    fn join(&self, parts: &[&str]) -> String {
        parts.join("/")
    }

    fn normalize_path(&self, path: &str) -> String {
        path::normalize_path(path)
    }

    fn is_absolute_path(&self, path: &str) -> bool {
        path::is_absolute_path(path)
    }
}

impl<V: Vfs + ?Sized> Vfs for Box<V> {
    fn is_file(&self, path: &str) -> bool {
        (**self).is_file(path)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        (**self).read_dir(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        (**self).is_dir(path)
    }

    fn cwd(&self) -> String {
        (**self).cwd()
    }

    fn join(&self, parts: &[&str]) -> String {
        (**self).join(parts)
    }

    fn normalize_path(&self, path: &str) -> String {
        (**self).normalize_path(path)
    }

    fn is_absolute_path(&self, path: &str) -> bool {
        (**self).is_absolute_path(path)
    }
}

/// Components of `path` below the filesystem root, `None` if it climbs above it.
///
/// A leading drive letter is ignored.
fn root_components(path: &str) -> Option<Vec<String>> {
    let normalized = path::normalize_path(path);
    let mut components = normalized.split('/').filter(|c| !c.is_empty() && *c != ".").peekable();

    if path::is_absolute_path(&normalized) && components.peek().is_some_and(|c| c.ends_with(':')) {
        components.next();
    }

    components
        .map(|c| if c == ".." { None } else { Some(c.to_string()) })
        .collect()
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such file or directory"))
}

/// An in-memory tree, handy for embedding scripts and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    files: BTreeMap<Vec<String>, Vec<u8>>,
    dirs: BTreeSet<Vec<String>>,
}

impl MemoryVfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, creating its parent directories.
    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        let Some(key) = root_components(path) else {
            return;
        };

        for depth in 0..key.len() {
            self.dirs.insert(key[..depth].to_vec());
        }

        self.files.insert(key, contents.into());
    }

    /// Adds an empty directory.
    pub fn insert_dir(&mut self, path: &str) {
        let Some(key) = root_components(path) else {
            return;
        };

        for depth in 0..=key.len() {
            self.dirs.insert(key[..depth].to_vec());
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    #[must_use]
    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert_dir(path);
        self
    }
}

impl Vfs for MemoryVfs {
    fn is_file(&self, path: &str) -> bool {
        root_components(path).is_some_and(|key| self.files.contains_key(&key))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let key = root_components(path).ok_or_else(|| not_found(path))?;

        if !key.is_empty() && !self.dirs.contains(&key) {
            return Err(not_found(path));
        }

        let depth = key.len();
        let children = |entry: &Vec<String>| {
            (entry.len() == depth + 1 && entry.starts_with(&key)).then(|| entry[depth].clone())
        };

        let names: BTreeSet<String> = self
            .files
            .keys()
            .chain(self.dirs.iter())
            .filter_map(children)
            .collect();

        Ok(names.into_iter().collect())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        root_components(path)
            .and_then(|key| self.files.get(&key))
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

/// A directory on disk acting as the filesystem root.
///
/// Absolute and relative paths alike resolve below `root`; paths climbing out of it do not exist.
#[cfg(feature = "fs")]
#[derive(Debug, Clone)]
pub struct DirVfs {
    root: PathBuf,
}

#[cfg(feature = "fs")]
impl DirVfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let components = root_components(path).ok_or_else(|| not_found(path))?;

        Ok(components.iter().fold(self.root.clone(), |acc, c| acc.join(c)))
    }
}

#[cfg(feature = "fs")]
impl Vfs for DirVfs {
    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = std::fs::read_dir(self.resolve(path)?)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;

        names.sort();
        Ok(names)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_dir())
    }
}
