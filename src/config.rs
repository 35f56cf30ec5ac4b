//! Project configuration: packages, modules, and the canonical shape the
//! rest of the engine consumes regardless of how the caller's build system
//! names things.
//!
//! Grounded on the teacher's single-root assumption (`cache.rs`'s
//! `cache_dir()` walks up from one root) generalized to the multi-package,
//! multi-module shape used by the cross-package monorepo scenario test.

use crate::error::{OmniError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One compilable unit: a name and the directory tree it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    /// Path to the package root, relative to the config file.
    pub root: PathBuf,
    /// Path to a tsconfig-equivalent compile configuration, if any.
    #[serde(default)]
    pub tsconfig_path: Option<PathBuf>,
}

/// Canonical, resolved project configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
    /// Optional grouping of package names into modules, for the
    /// cross-package/cross-module distinction used by impact queries.
    #[serde(default)]
    pub modules: HashMap<String, Vec<String>>,
    /// Root the config file itself lives under; all package roots are
    /// relative to this.
    #[serde(skip)]
    pub config_root: PathBuf,
}

impl ProjectConfig {
    /// A single-package config rooted at `root`, used when no config file
    /// is present.
    pub fn single_package(root: PathBuf) -> Self {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string());
        Self {
            packages: vec![PackageConfig {
                name,
                root: PathBuf::from("."),
                tsconfig_path: None,
            }],
            modules: HashMap::new(),
            config_root: root,
        }
    }

    /// Load from `omni.toml` at `path`, or fall back to `single_package`
    /// rooted at `path`'s parent directory if no file exists there.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            return Ok(Self::single_package(root));
        }
        let text = std::fs::read_to_string(path)?;
        let mut cfg: ProjectConfig = toml::from_str(&text)
            .map_err(|e| OmniError::Config(format!("{}: {e}", path.display())))?;
        cfg.config_root = path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        if cfg.packages.is_empty() {
            return Err(OmniError::Config(format!(
                "{}: no packages declared",
                path.display()
            )));
        }
        Ok(cfg)
    }

    /// Module name that owns `package_name`, if any module grouping exists.
    pub fn module_of(&self, package_name: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == package_name))
            .map(|(module, _)| module.as_str())
    }

    pub fn package_root_abs(&self, pkg: &PackageConfig) -> PathBuf {
        self.config_root.join(&pkg.root)
    }

    /// A copy of this config restricted to the single package whose root
    /// resolves to `abs_root` (the package `omni index` without `--all`
    /// should touch). Falls back to the full package set when no package's
    /// root matches, rather than silently indexing nothing.
    pub fn scoped_to_root(&self, abs_root: &Path) -> Self {
        let canonical_target = abs_root.canonicalize().unwrap_or_else(|_| abs_root.to_path_buf());
        let packages: Vec<PackageConfig> = self
            .packages
            .iter()
            .filter(|pkg| {
                let pkg_root = self.package_root_abs(pkg);
                let canonical_pkg_root = pkg_root.canonicalize().unwrap_or(pkg_root);
                canonical_pkg_root == canonical_target
            })
            .cloned()
            .collect();
        if packages.is_empty() {
            return self.clone();
        }
        Self {
            packages,
            modules: self.modules.clone(),
            config_root: self.config_root.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_package_has_one_entry() {
        let cfg = ProjectConfig::single_package(PathBuf::from("/tmp/proj"));
        assert_eq!(cfg.packages.len(), 1);
        assert_eq!(cfg.packages[0].root, PathBuf::from("."));
    }

    #[test]
    fn load_missing_file_falls_back() {
        let cfg = ProjectConfig::load_or_default(Path::new("/tmp/does-not-exist/omni.toml"))
            .expect("fallback should not error");
        assert_eq!(cfg.packages.len(), 1);
    }

    #[test]
    fn module_of_looks_up_group() {
        let mut cfg = ProjectConfig::single_package(PathBuf::from("/tmp/proj"));
        cfg.modules
            .insert("backend".to_string(), vec!["api".to_string(), "services".to_string()]);
        assert_eq!(cfg.module_of("services"), Some("backend"));
        assert_eq!(cfg.module_of("unknown"), None);
    }

    #[test]
    fn scoped_to_root_keeps_only_the_matching_package() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        std::fs::create_dir_all(dir.path().join("services")).unwrap();
        let mut cfg = ProjectConfig::single_package(dir.path().to_path_buf());
        cfg.packages = vec![
            PackageConfig { name: "api".to_string(), root: PathBuf::from("api"), tsconfig_path: None },
            PackageConfig { name: "services".to_string(), root: PathBuf::from("services"), tsconfig_path: None },
        ];

        let scoped = cfg.scoped_to_root(&dir.path().join("services"));
        assert_eq!(scoped.packages.len(), 1);
        assert_eq!(scoped.packages[0].name, "services");
    }

    #[test]
    fn scoped_to_root_falls_back_to_all_packages_when_unmatched() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ProjectConfig::single_package(dir.path().to_path_buf());
        let scoped = cfg.scoped_to_root(Path::new("/no/such/package"));
        assert_eq!(scoped.packages.len(), cfg.packages.len());
    }
}
