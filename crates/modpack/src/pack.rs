//! Loads one module pack directory into memory.
//!
//! `ModulePack::load` reads `module.toml`, validates it, and pulls in the
//! GLSL source it points at. Failures are classified so callers can tell a
//! missing manifest from a malformed one or a missing source file.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use preprocessor::{Module, SandboxError};

use crate::manifest::ModuleManifest;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("module source not found at {0}")]
    SourceMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A module pack read off disk: manifest plus GLSL source.
#[derive(Debug, Clone)]
pub struct ModulePack {
    root: PathBuf,
    manifest: ModuleManifest,
    source: String,
}

impl ModulePack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join("module.toml");
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest: ModuleManifest = toml::from_str(&manifest_raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        let source_path = root.join(&manifest.source);
        if !source_path.exists() {
            return Err(PackError::SourceMissing(source_path));
        }
        let source = fs::read_to_string(&source_path)?;

        Ok(Self {
            root,
            manifest,
            source,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Builds the preprocessor module this pack describes.
    pub fn into_module(self) -> Result<Module, SandboxError> {
        Module::new(
            self.manifest.name.clone(),
            self.source,
            self.manifest.into_options(),
        )
    }
}
