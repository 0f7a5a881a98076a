/// Overrides the cache key prefix.
pub const CACHE_PREFIX_ENV: &str = "LUAU_REQUIRE_CACHE_PREFIX";
/// Enables navigation logging when set to `1` or `true`.
pub const DEBUG_ENV: &str = "LUAU_REQUIRE_DEBUG";

/// Settings for [`crate::require::SimpleRequirer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirerConfig {
    /// Prepended to cache keys as `prefix@path`.
    pub cache_prefix: String,
    /// Log every navigation step at debug level.
    pub debug: bool,
}

impl Default for RequirerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "luau".to_string(),
            debug: false,
        }
    }
}

impl RequirerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Defaults, overridden by any of the `LUAU_REQUIRE_*` variables that are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(prefix) = lookup(CACHE_PREFIX_ENV).filter(|p| !p.is_empty()) {
            config.cache_prefix = prefix;
        }

        if let Some(debug) = lookup(DEBUG_ENV) {
            config.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true");
        }

        config
    }
}
