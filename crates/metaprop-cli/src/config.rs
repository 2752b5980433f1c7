//! Configuration file support.

use indexmap::IndexMap;
use metaprop_core::{CategoryRegistry, FileLinkPolicy, GroupingId};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default CLI options.
    pub defaults: Defaults,
    /// Extra grouping domain members, name to numeric id.
    pub categories: IndexMap<String, i64>,
}

/// Default CLI options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Enable verbose output by default.
    pub verbose: bool,
    /// Enable quiet output by default.
    pub quiet: bool,
    /// Folder that relative input paths are resolved against.
    pub input_dir: Option<PathBuf>,
    /// Whether File and Link properties may be written as text.
    pub file_links: FileLinkPolicy,
    /// Create missing slots in the store from the resolved value kind.
    pub create_missing: bool,
    /// Exit with an error when any record fails.
    pub strict: bool,
}

impl Config {
    /// Load config from the default location (~/.config/metaprop/config.toml).
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("metaprop").join("config.toml"))
    }

    /// Default grouping domain plus the members declared in `[categories]`.
    pub fn category_registry(&self) -> CategoryRegistry {
        let mut registry = CategoryRegistry::default();
        for (name, id) in &self.categories {
            registry.register(name.clone(), GroupingId(*id));
        }
        registry
    }

    /// Resolve an input path against `defaults.input_dir`.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_input(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.defaults.input_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaprop_core::CategoryLookup;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
            [defaults]
            verbose = true
            input_dir = "/data/exports"
            file_links = "write"

            [categories]
            PG_DATA = -5000100
            "#,
        )
        .unwrap();

        assert!(config.defaults.verbose);
        assert_eq!(config.defaults.file_links, FileLinkPolicy::Write);
        assert!(!config.defaults.create_missing);

        let registry = config.category_registry();
        assert_eq!(registry.lookup("PG_DATA").unwrap(), GroupingId(-5000100));
        assert_eq!(registry.lookup("-1").unwrap(), GroupingId::INVALID);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = Config::load_from_path(Some(PathBuf::from("/nonexistent/metaprop.toml")));
        assert_eq!(config.defaults.file_links, FileLinkPolicy::Reject);
        assert!(config.categories.is_empty());
    }

    #[test]
    fn test_resolve_input() {
        let mut config = Config::default();
        assert_eq!(config.resolve_input("a.csv"), PathBuf::from("a.csv"));

        config.defaults.input_dir = Some(PathBuf::from("/data"));
        assert_eq!(config.resolve_input("a.csv"), PathBuf::from("/data/a.csv"));
        assert_eq!(config.resolve_input("/tmp/a.csv"), PathBuf::from("/tmp/a.csv"));
    }
}
