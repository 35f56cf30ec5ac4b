//! Project registry (§4.8): cross-package resolution support for the
//! import map builder. A lookup table from an absolute file path to the
//! package project context that owns it, so the resolver can re-invoke
//! alias resolution in a different package's compile configuration when a
//! barrel file's own path aliases only make sense there.
//!
//! Grounded on `config.rs`'s multi-package `ProjectConfig`, generalized
//! here into a path-ownership index built once per run.

use crate::config::{PackageConfig, ProjectConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One package's resolved project context: its name and the absolute root
/// directory its files live under.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    pub package_name: String,
    pub module_name: Option<String>,
    pub root_abs: PathBuf,
}

/// Maps an absolute file path to the package that owns it. Built once from
/// `ProjectConfig` and consulted whenever the import map builder needs to
/// re-resolve a symbol defined in another workspace package.
pub struct ProjectRegistry {
    /// Package roots, longest-prefix first, so nested package roots resolve
    /// to their most specific owner.
    roots: Vec<ProjectHandle>,
}

impl ProjectRegistry {
    pub fn build(config: &ProjectConfig) -> Self {
        let mut roots: Vec<ProjectHandle> = config
            .packages
            .iter()
            .map(|pkg: &PackageConfig| ProjectHandle {
                package_name: pkg.name.clone(),
                module_name: config.module_of(&pkg.name).map(|s| s.to_string()),
                root_abs: config.package_root_abs(pkg),
            })
            .collect();
        // Longest path first so a nested package root wins over its parent.
        roots.sort_by(|a, b| {
            b.root_abs
                .as_os_str()
                .len()
                .cmp(&a.root_abs.as_os_str().len())
        });
        Self { roots }
    }

    /// Returns the package owning `abs_path`, if any configured root is a
    /// prefix of it.
    pub fn owner_of(&self, abs_path: &Path) -> Option<&ProjectHandle> {
        self.roots
            .iter()
            .find(|handle| abs_path.starts_with(&handle.root_abs))
    }

    pub fn package_named(&self, name: &str) -> Option<&ProjectHandle> {
        self.roots.iter().find(|h| h.package_name == name)
    }

    /// All configured roots, longest-prefix first.
    pub fn roots(&self) -> &[ProjectHandle] {
        &self.roots
    }
}

/// A cache of already-resolved `path -> package` lookups, to avoid
/// re-walking `roots` for every import in a hot loop. Keyed as a
/// `BTreeMap` so iteration order (used only by tests) is deterministic.
#[derive(Default)]
pub struct OwnerCache {
    cache: BTreeMap<PathBuf, Option<String>>,
}

impl OwnerCache {
    pub fn package_name_for(&mut self, registry: &ProjectRegistry, abs_path: &Path) -> Option<String> {
        if let Some(hit) = self.cache.get(abs_path) {
            return hit.clone();
        }
        let resolved = registry.owner_of(abs_path).map(|h| h.package_name.clone());
        self.cache.insert(abs_path.to_path_buf(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use std::path::PathBuf;

    fn cfg() -> ProjectConfig {
        let mut cfg = ProjectConfig {
            packages: vec![
                PackageConfig {
                    name: "api".to_string(),
                    root: PathBuf::from("packages/api"),
                    tsconfig_path: None,
                },
                PackageConfig {
                    name: "shared".to_string(),
                    root: PathBuf::from("packages/shared"),
                    tsconfig_path: None,
                },
            ],
            modules: Default::default(),
            config_root: PathBuf::from("/repo"),
        };
        cfg.modules
            .insert("backend".to_string(), vec!["api".to_string()]);
        cfg
    }

    #[test]
    fn owner_of_resolves_nested_path() {
        let registry = ProjectRegistry::build(&cfg());
        let handle = registry
            .owner_of(&PathBuf::from("/repo/packages/api/src/foo.ts"))
            .expect("should resolve");
        assert_eq!(handle.package_name, "api");
        assert_eq!(handle.module_name.as_deref(), Some("backend"));
    }

    #[test]
    fn owner_of_returns_none_outside_any_root() {
        let registry = ProjectRegistry::build(&cfg());
        assert!(registry
            .owner_of(&PathBuf::from("/elsewhere/foo.ts"))
            .is_none());
    }

    #[test]
    fn owner_cache_memoizes() {
        let registry = ProjectRegistry::build(&cfg());
        let mut cache = OwnerCache::default();
        let path = PathBuf::from("/repo/packages/shared/src/bar.ts");
        assert_eq!(
            cache.package_name_for(&registry, &path),
            Some("shared".to_string())
        );
        assert_eq!(
            cache.package_name_for(&registry, &path),
            Some("shared".to_string())
        );
    }
}
