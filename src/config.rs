use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::query::UnknownFieldPolicy;
use crate::routes::MatchPolicy;

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    pub query: QueryConfig,
    pub scroll: ScrollConfig,
    pub routes: RoutesConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub loading_hide_delay_ms: u64,
    pub error_flush_delay_ms: u64,
    pub default_error_message: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            loading_hide_delay_ms: 100,
            error_flush_delay_ms: 100,
            default_error_message: "Something went wrong".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn loading_hide_delay(&self) -> Duration {
        Duration::from_millis(self.loading_hide_delay_ms)
    }

    pub fn error_flush_delay(&self) -> Duration {
        Duration::from_millis(self.error_flush_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: u64,
    pub unknown_fields: UnknownFieldPolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            unknown_fields: UnknownFieldPolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScrollConfig {
    pub history_capacity: usize,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteEntry {
    pub key: String,
    pub prefix: String,
}

impl RouteEntry {
    fn new(key: &str, prefix: &str) -> Self {
        Self {
            key: key.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoutesConfig {
    pub policy: MatchPolicy,
    pub entries: Vec<RouteEntry>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::FirstDeclared,
            entries: vec![
                RouteEntry::new("directory", "/directory"),
                RouteEntry::new("file", "/file"),
                RouteEntry::new("relationships", "/relationships"),
                RouteEntry::new("search", "/search"),
                RouteEntry::new("stats", "/stats"),
                RouteEntry::new("autopath", "/config/autopath"),
            ],
        }
    }
}

impl Config {
    pub fn load() -> AppResult<Self> {
        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        if !path.is_file() {
            return Err(AppError::config(format!(
                "config path is not a regular file: {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read config: {}", path.display()))
        })?;
        let parsed = toml::from_str::<Self>(&raw).map_err(|source| {
            AppError::config(format!("failed to parse config {}: {source}", path.display()))
        })?;
        Ok(parsed.sanitized())
    }

    pub fn sanitized(mut self) -> Self {
        self.coordinator.loading_hide_delay_ms = self.coordinator.loading_hide_delay_ms.max(1);
        self.coordinator.error_flush_delay_ms = self.coordinator.error_flush_delay_ms.max(1);
        if self.coordinator.default_error_message.trim().is_empty() {
            self.coordinator.default_error_message =
                CoordinatorConfig::default().default_error_message;
        }
        self.query.page_size = self.query.page_size.max(1);
        self.scroll.history_capacity = self.scroll.history_capacity.max(1);
        self.routes
            .entries
            .retain(|entry| !entry.key.trim().is_empty());
        self
    }
}

pub const CONFIG_PATH_ENV: &str = "NAVSYNC_CONFIG_PATH";

/// Environment roots in lookup order, each with the path appended below it.
const CONFIG_ROOTS: [(&str, &[&str]); 4] = [
    (CONFIG_PATH_ENV, &[]),
    ("XDG_CONFIG_HOME", &["navsync", "config.toml"]),
    ("HOME", &[".config", "navsync", "config.toml"]),
    ("APPDATA", &["navsync", "config.toml"]),
];

pub fn default_config_path() -> Option<PathBuf> {
    config_path_with(|name| std::env::var_os(name))
}

fn config_path_with<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    CONFIG_ROOTS.iter().find_map(|&(name, tail)| {
        let root = lookup(name).filter(|value| !value.is_empty())?;
        Some(tail.iter().fold(PathBuf::from(root), |path, part| path.join(part)))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{Config, config_path_with};
    use crate::query::UnknownFieldPolicy;
    use crate::routes::MatchPolicy;

    /// A config file path under the temp dir, removed on drop.
    struct TempConfig(PathBuf);

    impl TempConfig {
        fn new(name: &str) -> Self {
            static NEXT: AtomicUsize = AtomicUsize::new(0);
            let serial = NEXT.fetch_add(1, Ordering::Relaxed);
            let file = format!("navsync-{}-{serial}-{name}", process::id());
            Self(std::env::temp_dir().join(file))
        }

        fn with_contents(name: &str, contents: &str) -> Self {
            let config = Self::new(name);
            fs::write(&config.0, contents).expect("config file should be written");
            config
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), OsString::from(value)))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn explicit_path_wins_and_empty_roots_are_skipped() {
        let explicit = lookup(&[("NAVSYNC_CONFIG_PATH", "/etc/nav.toml"), ("HOME", "/home/u")]);
        assert_eq!(config_path_with(explicit), Some(PathBuf::from("/etc/nav.toml")));

        let home = lookup(&[("XDG_CONFIG_HOME", ""), ("HOME", "/home/u")]);
        assert_eq!(
            config_path_with(home),
            Some(PathBuf::from("/home/u/.config/navsync/config.toml"))
        );
        assert_eq!(config_path_with(lookup(&[])), None);
    }

    #[test]
    fn load_from_path_returns_defaults_for_missing_file() {
        let missing = TempConfig::new("missing.toml");
        let config =
            Config::load_from_path(missing.path()).expect("missing config should fallback");
        assert_eq!(config, Config::default());
        assert_eq!(config.coordinator.loading_hide_delay_ms, 100);
        assert_eq!(config.scroll.history_capacity, 20);
    }

    #[test]
    fn load_from_path_applies_partial_overrides_and_sanitizes() {
        let file = TempConfig::with_contents(
            "custom.toml",
            r#"
            [coordinator]
            loading_hide_delay_ms = 0
            default_error_message = "   "

            [query]
            page_size = 0
            unknown_fields = "passthrough"

            [scroll]
            history_capacity = 0

            [routes]
            policy = "longest-prefix"
            entries = [
                { key = "directory", prefix = "/directory" },
                { key = "", prefix = "/ignored" },
            ]
            "#,
        );

        let config = Config::load_from_path(file.path()).expect("config should parse");
        assert_eq!(config.coordinator.loading_hide_delay_ms, 1);
        assert_eq!(config.coordinator.error_flush_delay_ms, 100);
        assert_eq!(config.coordinator.default_error_message, "Something went wrong");
        assert_eq!(config.query.page_size, 1);
        assert_eq!(config.query.unknown_fields, UnknownFieldPolicy::Passthrough);
        assert_eq!(config.scroll.history_capacity, 1);
        assert_eq!(config.routes.policy, MatchPolicy::LongestPrefix);
        assert_eq!(config.routes.entries.len(), 1);
    }

    #[test]
    fn load_from_path_rejects_malformed_toml() {
        let file =
            TempConfig::with_contents("broken.toml", "[coordinator\nloading_hide_delay_ms = ");
        assert!(Config::load_from_path(file.path()).is_err());
    }
}
