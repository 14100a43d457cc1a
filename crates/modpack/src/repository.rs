//! Resolves module packs across search roots and installs them into a
//! design-time registry.
//!
//! Module names may contain `/`, so a pack for `fx/warp` lives at
//! `<root>/fx/warp/module.toml`. Discovery walks every root recursively and
//! collects each directory carrying a manifest; installation funnels the
//! packs through `ModuleRegistry::define`, so reserved and duplicate names
//! fault the same way programmatic definitions do.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use preprocessor::ModuleRegistry;

use crate::pack::ModulePack;

#[derive(Debug, Clone)]
pub struct ModuleRepository {
    search_roots: Vec<PathBuf>,
}

impl ModuleRepository {
    pub fn new(search_roots: Vec<PathBuf>) -> Self {
        Self { search_roots }
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    /// Loads the pack registered under `name`, trying each root in order.
    pub fn resolve(&self, name: &str) -> Result<ModulePack> {
        if name.trim().is_empty() {
            bail!("module name must not be empty");
        }
        for root in &self.search_roots {
            let candidate = root.join(name);
            debug!(candidate = %candidate.display(), "checking module pack candidate");
            if candidate.join("module.toml").exists() {
                return ModulePack::load(&candidate)
                    .with_context(|| format!("failed to load module pack '{name}'"));
            }
        }
        Err(anyhow!(
            "unable to locate module pack '{}'. searched roots: {:?}",
            name,
            self.search_roots
        ))
    }

    /// Every pack found under the search roots. Directories whose manifests
    /// fail to load are skipped with a warning instead of aborting the walk.
    pub fn discover(&self) -> Result<Vec<ModulePack>> {
        let mut packs = Vec::new();
        for root in &self.search_roots {
            if !root.exists() {
                warn!(root = %root.display(), "module search root missing");
                continue;
            }
            walk(root, &mut packs)?;
        }
        Ok(packs)
    }

    /// Discovers every pack and defines it in `registry`. Reserved or
    /// duplicate names abort with the underlying fault.
    pub fn install(&self, registry: &mut ModuleRegistry) -> Result<usize> {
        let packs = self.discover()?;
        let mut installed = 0usize;
        for pack in packs {
            let name = pack.name().to_string();
            let options = pack.manifest().clone().into_options();
            registry
                .define(&name, pack.source(), options)
                .with_context(|| format!("failed to define module '{name}'"))?;
            debug!(module = %name, "installed module pack");
            installed += 1;
        }
        Ok(installed)
    }
}

fn walk(dir: &Path, packs: &mut Vec<ModulePack>) -> Result<()> {
    if dir.join("module.toml").exists() {
        match ModulePack::load(dir) {
            Ok(pack) => packs.push(pack),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "skipping unloadable module pack");
            }
        }
        return Ok(());
    }

    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read module root {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            walk(&entry.path(), packs)?;
        }
    }
    Ok(())
}
