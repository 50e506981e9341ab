//! `package.json` discovery and the `"jopi"` settings section.

use crate::config::defaults::{
    KNOWN_PRELOAD_PACKAGES, default_file_stability_ms, default_restart_debounce_ms,
};
use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Format as _, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The `"jopi"` section of `package.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JopiSection {
    /// Force watch mode on or off, even in production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,

    /// Let the runtime reload in place instead of restarting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot: Option<bool>,

    /// Directories to watch, relative to the manifest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watch_dirs: Vec<PathBuf>,

    /// Debounce window before a restart
    #[serde(default = "default_restart_debounce_ms")]
    pub restart_debounce_ms: u64,

    /// Quiet period before a changed file is reported
    #[serde(default = "default_file_stability_ms")]
    pub file_stability_ms: u64,
}

impl Default for JopiSection {
    fn default() -> Self {
        Self {
            watch: None,
            hot: None,
            watch_dirs: Vec::new(),
            restart_debounce_ms: default_restart_debounce_ms(),
            file_stability_ms: default_file_stability_ms(),
        }
    }
}

/// The parts of `package.json` the supervisor reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Modules to preload in the runtime
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preload: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub jopi: JopiSection,
}

impl PackageManifest {
    /// Load `package.json` from `path`, layering it over the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        Figment::new()
            .merge(Serialized::defaults(PackageManifest::default()))
            .merge(Json::file(path))
            .extract()
            .map_err(|e| {
                ConfigError::InvalidManifest {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Explicit `preload` entries followed by known packages found in
    /// `devDependencies` and `dependencies`, without duplicates.
    pub fn preload_modules(&self) -> Vec<String> {
        let mut modules = self.preload.clone();

        for deps in [&self.dev_dependencies, &self.dependencies] {
            for name in deps.keys() {
                if KNOWN_PRELOAD_PACKAGES.contains(&name.as_str()) && !modules.contains(name) {
                    modules.push(name.clone());
                }
            }
        }

        modules
    }
}

/// Walks up the directory tree to find the nearest package.json.
///
/// Returns the directory that contains it.
pub fn find_package_json(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let package_json_path = current.join("package.json");

        if package_json_path.is_file() {
            return Some(current.to_path_buf());
        }

        current = current.parent()?;
    }
}
