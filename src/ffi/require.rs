//! The require contract across the C ABI.
//!
//! [`export_require`] turns any [`Require`] implementation into a table of
//! [`ForeignCallback`]s the engine can drive, and [`ForeignRequire`] drives such a table
//! from Rust.
//!
//! Strings inside request records are borrowed by the callee for the duration of the call.
//! Strings and buffers the callee writes into a record are owned by the caller afterwards.

use std::{
    ffi::{c_char, c_void},
    sync::Arc,
};

use parking_lot::Mutex;

use super::{
    callback::ForeignCallback,
    string::{borrow_str, c_string, move_string_from_c, to_c_string, RawBytes},
};
use crate::{
    callback::{wrap_failable, CallbackPanic},
    chunk::ChunkLoader,
    error::{Error, Result},
    require::{NavigateError, NavigationResult, Require},
    value::LuaFunction,
};

/// A [`NavigationResult`] in C layout. All fields unset means success.
#[repr(C)]
#[derive(Debug)]
pub struct RawNavigationResult {
    pub not_found: bool,
    pub ambiguous: bool,
    pub other: *mut c_char,
}

impl RawNavigationResult {
    pub const fn success() -> Self {
        Self {
            not_found: false,
            ambiguous: false,
            other: std::ptr::null_mut(),
        }
    }

    pub fn from_result(result: NavigationResult) -> Self {
        let mut raw = Self::success();

        match result {
            Ok(()) => {}
            Err(NavigateError::NotFound) => raw.not_found = true,
            Err(NavigateError::Ambiguous) => raw.ambiguous = true,
            Err(NavigateError::Other(msg)) => raw.other = to_c_string(msg),
        }

        raw
    }

    /// Converts back, taking ownership of the `other` message.
    ///
    /// # Safety
    /// `other` must be null or a string allocated by this crate's string exports.
    pub unsafe fn into_result(self) -> NavigationResult {
        let other = move_string_from_c(self.other);

        if self.not_found {
            Err(NavigateError::NotFound)
        } else if self.ambiguous {
            Err(NavigateError::Ambiguous)
        } else if let Some(msg) = other {
            Err(NavigateError::Other(msg))
        } else {
            Ok(())
        }
    }
}

#[repr(C)]
pub struct IsRequireAllowed {
    pub chunk_name: *const c_char,
    pub data: bool,
}

/// Request record shared by `reset`, `jump_to_alias` and `to_child`.
#[repr(C)]
pub struct NavigateTo {
    pub path: *const c_char,
    pub data: RawNavigationResult,
}

#[repr(C)]
pub struct ToParent {
    pub data: RawNavigationResult,
}

/// Request record shared by `has_module` and `has_config`.
#[repr(C)]
pub struct Flag {
    pub data: bool,
}

#[repr(C)]
pub struct CacheKey {
    pub data: *mut c_char,
}

#[repr(C)]
pub struct Config {
    pub data: RawBytes,
    pub error: *mut c_char,
}

#[repr(C)]
pub struct Loader {
    /// A `*const &dyn ChunkLoader`, valid for the duration of the call.
    pub loader: *const c_void,
    /// An owned function pointer, disarmed on the callee side.
    pub function: *mut c_void,
    pub error: *mut c_char,
}

/// The ten require operations as C callbacks.
#[repr(C)]
pub struct RequireCallbacks {
    pub is_require_allowed: ForeignCallback,
    pub reset: ForeignCallback,
    pub jump_to_alias: ForeignCallback,
    pub to_parent: ForeignCallback,
    pub to_child: ForeignCallback,
    pub has_module: ForeignCallback,
    pub cache_key: ForeignCallback,
    pub has_config: ForeignCallback,
    pub config: ForeignCallback,
    pub loader: ForeignCallback,
}

impl RequireCallbacks {
    pub fn into_foreign(self) -> ForeignRequire {
        ForeignRequire { callbacks: self }
    }
}

fn recover_navigation(
    op: &'static str,
    f: impl FnOnce() -> NavigationResult,
) -> RawNavigationResult {
    let result = wrap_failable(|| Ok::<_, CallbackPanic>(f())).unwrap_or_else(
        |CallbackPanic(msg)| Err(NavigateError::Other(format!("panic in {op}: {msg}"))),
    );

    RawNavigationResult::from_result(result)
}

fn recover_message<T>(op: &'static str, f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    wrap_failable(|| Ok::<_, CallbackPanic>(f()))
        .map_err(|CallbackPanic(msg)| format!("panic in {op}: {msg}"))
}

/// Builds the callback table driving `require`.
///
/// Calls are serialized through a mutex, and a panic in any operation is reported as
/// that operation's failure value.
pub fn export_require<R: Require + Send + 'static>(require: R) -> RequireCallbacks {
    let shared = Arc::new(Mutex::new(require));

    macro_rules! callback {
        (|$req:ident, $data:ident: $record:ty| $body:expr) => {{
            let shared = Arc::clone(&shared);
            ForeignCallback::new(move |ptr: *mut c_void| {
                // SAFETY: each callback is only ever filled with its own record type
                let $data = unsafe { &mut *ptr.cast::<$record>() };
                let $req = &shared;
                $body
            })
        }};
    }

    RequireCallbacks {
        is_require_allowed: callback!(|req, data: IsRequireAllowed| {
            let chunk_name = unsafe { borrow_str(data.chunk_name) };
            data.data = wrap_failable(|| req.lock().is_require_allowed(&chunk_name));
        }),
        reset: callback!(|req, data: NavigateTo| {
            let path = unsafe { borrow_str(data.path) };
            data.data = recover_navigation("reset", || req.lock().reset(&path));
        }),
        jump_to_alias: callback!(|req, data: NavigateTo| {
            let path = unsafe { borrow_str(data.path) };
            data.data = recover_navigation("jump_to_alias", || req.lock().jump_to_alias(&path));
        }),
        to_parent: callback!(|req, data: ToParent| {
            data.data = recover_navigation("to_parent", || req.lock().to_parent());
        }),
        to_child: callback!(|req, data: NavigateTo| {
            let name = unsafe { borrow_str(data.path) };
            data.data = recover_navigation("to_child", || req.lock().to_child(&name));
        }),
        has_module: callback!(|req, data: Flag| {
            data.data = wrap_failable(|| req.lock().has_module());
        }),
        cache_key: callback!(|req, data: CacheKey| {
            let key = recover_message("cache_key", || req.lock().cache_key()).unwrap_or_default();
            data.data = to_c_string(key);
        }),
        has_config: callback!(|req, data: Flag| {
            data.data = wrap_failable(|| req.lock().has_config());
        }),
        config: callback!(|req, data: Config| {
            match recover_message("config", || req.lock().config()) {
                Ok(Ok(contents)) => data.data = RawBytes::from_vec(contents),
                Ok(Err(err)) => data.error = to_c_string(err.to_string()),
                Err(msg) => data.error = to_c_string(msg),
            }
        }),
        loader: callback!(|req, data: Loader| {
            // SAFETY: the caller keeps the loader reference alive for the call
            let loader: &dyn ChunkLoader = unsafe { *data.loader.cast::<&dyn ChunkLoader>() };

            let function = recover_message("loader", || req.lock().loader(loader))
                .and_then(|res| res.and_then(LuaFunction::into_raw).map_err(|err| err.to_string()));

            match function {
                Ok(ptr) => data.function = ptr,
                Err(msg) => data.error = to_c_string(msg),
            }
        }),
    }
}

/// Drives a foreign [`RequireCallbacks`] table through the [`Require`] trait.
pub struct ForeignRequire {
    callbacks: RequireCallbacks,
}

impl ForeignRequire {
    fn navigate(callback: &ForeignCallback, path: &str) -> NavigationResult {
        let path = c_string(path);

        // SAFETY: NavigateTo is the record for path navigation callbacks
        let data = unsafe {
            callback.fill(NavigateTo {
                path: path.as_ptr(),
                data: RawNavigationResult::success(),
            })
        };

        unsafe { data.data.into_result() }
    }
}

impl Require for ForeignRequire {
    fn is_require_allowed(&self, chunk_name: &str) -> bool {
        let chunk_name = c_string(chunk_name);

        let data = unsafe {
            self.callbacks.is_require_allowed.fill(IsRequireAllowed {
                chunk_name: chunk_name.as_ptr(),
                data: false,
            })
        };

        data.data
    }

    fn reset(&mut self, chunk_name: &str) -> NavigationResult {
        Self::navigate(&self.callbacks.reset, chunk_name)
    }

    fn jump_to_alias(&mut self, path: &str) -> NavigationResult {
        Self::navigate(&self.callbacks.jump_to_alias, path)
    }

    fn to_parent(&mut self) -> NavigationResult {
        let data = unsafe {
            self.callbacks.to_parent.fill(ToParent {
                data: RawNavigationResult::success(),
            })
        };

        unsafe { data.data.into_result() }
    }

    fn to_child(&mut self, name: &str) -> NavigationResult {
        Self::navigate(&self.callbacks.to_child, name)
    }

    fn has_module(&self) -> bool {
        unsafe { self.callbacks.has_module.fill(Flag { data: false }) }.data
    }

    fn cache_key(&self) -> String {
        let data = unsafe {
            self.callbacks.cache_key.fill(CacheKey {
                data: std::ptr::null_mut(),
            })
        };

        unsafe { move_string_from_c(data.data) }.unwrap_or_default()
    }

    fn has_config(&self) -> bool {
        unsafe { self.callbacks.has_config.fill(Flag { data: false }) }.data
    }

    fn config(&self) -> std::io::Result<Vec<u8>> {
        let data = unsafe {
            self.callbacks.config.fill(Config {
                data: RawBytes::empty(),
                error: std::ptr::null_mut(),
            })
        };

        let contents = unsafe { data.data.into_vec() };

        match unsafe { move_string_from_c(data.error) } {
            Some(err) => Err(std::io::Error::other(err)),
            None => Ok(contents.unwrap_or_default()),
        }
    }

    fn loader(&self, loader: &dyn ChunkLoader) -> Result<LuaFunction> {
        let loader_ref: &dyn ChunkLoader = loader;

        let data = unsafe {
            self.callbacks.loader.fill(Loader {
                loader: (&loader_ref as *const &dyn ChunkLoader).cast(),
                function: std::ptr::null_mut(),
                error: std::ptr::null_mut(),
            })
        };

        // SAFETY: the callee disarmed the function before handing it over
        let function = unsafe { loader.lua().wrap_function(data.function) };

        if let Some(err) = unsafe { move_string_from_c(data.error) } {
            if let Some(function) = function {
                function.close()?;
            }
            return Err(Error::Native(err));
        }

        function.ok_or(Error::NullPointer("loaded function"))
    }
}

#[cfg(test)]
mod tests {
    use super::{export_require, RawNavigationResult};
    use crate::{
        chunk::ChunkLoader,
        error::{Error, Result},
        require::{
            requirer::tests::{project_vfs, MockLoader},
            NavigateError, NavigationResult, Require, RequirerConfig, SimpleRequirer,
        },
        value::LuaFunction,
    };

    #[test]
    fn raw_navigation_result() {
        for result in [
            Ok(()),
            Err(NavigateError::NotFound),
            Err(NavigateError::Ambiguous),
            Err(NavigateError::Other("bad path".into())),
        ] {
            let raw = RawNavigationResult::from_result(result.clone());
            assert_eq!(unsafe { raw.into_result() }, result);
        }
    }

    #[test]
    fn round_trip_matches_direct_calls() {
        let mut direct = SimpleRequirer::new(project_vfs(), RequirerConfig::default());
        let mut foreign =
            export_require(SimpleRequirer::new(project_vfs(), RequirerConfig::default()))
                .into_foreign();

        let steps: [(&str, fn(&mut dyn Require) -> NavigationResult); 8] = [
            ("reset", |r| r.reset("/game/main.luau")),
            ("to_parent", |r| r.to_parent()),
            ("to_child", |r| r.to_child("lib")),
            ("missing", |r| r.to_child("missing")),
            ("alias", |r| r.jump_to_alias("relative")),
            ("to_parent", |r| r.to_parent()),
            ("to_parent", |r| r.to_parent()),
            ("above root", |r| r.to_parent()),
        ];

        for (name, step) in steps {
            assert_eq!(step(&mut foreign), step(&mut direct), "step {name}");
            assert_eq!(foreign.has_module(), direct.has_module(), "has_module after {name}");
            assert_eq!(foreign.has_config(), direct.has_config(), "has_config after {name}");
            assert_eq!(foreign.cache_key(), direct.cache_key(), "cache_key after {name}");
        }

        foreign.reset("/game/util.luau").unwrap();
        foreign.to_parent().unwrap();
        assert_eq!(foreign.config().unwrap(), b"{\"aliases\": {}}");

        foreign.to_child("util").unwrap();
        assert_eq!(foreign.config().unwrap_err().kind(), std::io::ErrorKind::Other);

        assert!(foreign.is_require_allowed("/game/main.luau"));
    }

    #[test]
    fn loader_hands_over_function() {
        let loader = MockLoader::new();
        let mut foreign =
            export_require(SimpleRequirer::new(project_vfs(), RequirerConfig::default()))
                .into_foreign();

        foreign.reset("/game/lib/init.lua").unwrap();
        let func = foreign.loader(&loader).unwrap();

        assert!(!func.is_closed());
        assert!(func.lua().same_vm(&loader.lua));
        assert_eq!(loader.loaded.lock()[0].0, "/game/lib/init.lua");
        func.close().unwrap();

        foreign.reset("/game").unwrap();
        assert!(matches!(foreign.loader(&loader), Err(Error::Native(_))));
    }

    struct Panicking;

    impl Require for Panicking {
        fn is_require_allowed(&self, _: &str) -> bool {
            panic!("is_require_allowed")
        }
        fn reset(&mut self, _: &str) -> NavigationResult {
            panic!("reset exploded")
        }
        fn jump_to_alias(&mut self, _: &str) -> NavigationResult {
            panic!("jump")
        }
        fn to_parent(&mut self) -> NavigationResult {
            panic!("parent")
        }
        fn to_child(&mut self, _: &str) -> NavigationResult {
            panic!("child")
        }
        fn has_module(&self) -> bool {
            panic!("has_module")
        }
        fn cache_key(&self) -> String {
            panic!("cache_key")
        }
        fn has_config(&self) -> bool {
            panic!("has_config")
        }
        fn config(&self) -> std::io::Result<Vec<u8>> {
            panic!("config")
        }
        fn loader(&self, _: &dyn ChunkLoader) -> Result<LuaFunction> {
            panic!("loader")
        }
    }

    #[test]
    fn panics_become_failures() {
        let loader = MockLoader::new();
        let mut foreign = export_require(Panicking).into_foreign();

        assert_eq!(
            foreign.reset("x"),
            Err(NavigateError::Other("panic in reset: reset exploded".into()))
        );
        assert!(matches!(foreign.to_parent(), Err(NavigateError::Other(_))));
        assert!(matches!(foreign.to_child("x"), Err(NavigateError::Other(_))));
        assert!(matches!(foreign.jump_to_alias("/x"), Err(NavigateError::Other(_))));

        assert!(!foreign.is_require_allowed("x"));
        assert!(!foreign.has_module());
        assert!(!foreign.has_config());
        assert_eq!(foreign.cache_key(), "");
        assert_eq!(foreign.config().unwrap_err().to_string(), "panic in config: config");

        match foreign.loader(&loader) {
            Err(Error::Native(msg)) => assert_eq!(msg, "panic in loader: loader"),
            other => panic!("unexpected loader result {other:?}"),
        }
    }
}
