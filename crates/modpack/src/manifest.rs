//! Schema for on-disk module packs.
//!
//! A module pack is a directory holding a `module.toml` manifest next to a
//! GLSL source file. The manifest names the module, points at its source,
//! and declares option tables mapping user-facing knobs onto the uniforms
//! the GLSL reads:
//!
//! ```toml
//! name = "plasma"
//! source = "plasma.glsl"
//! description = "Animated interference pattern"
//!
//! [options.default.speed]
//! uniform = "u_speed"
//! default = 1.0
//!
//! [options.plasma.scale]
//! uniform = "u_scale"
//! default = 4.0
//! ```
//!
//! `validate` returns human-readable issues so loaders can surface
//! misconfigurations without panicking.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use preprocessor::{is_reserved_module_name, ModuleOptions};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleManifest {
    pub name: String,
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: ModuleOptions,
}

fn default_source() -> PathBuf {
    PathBuf::from("module.glsl")
}

impl ModuleManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push("module name must not be empty".to_string());
        }
        if is_reserved_module_name(&self.name) {
            issues.push(format!("module name '{}' is reserved", self.name));
        }
        if self.source.as_os_str().is_empty() {
            issues.push("module source path must not be empty".to_string());
        }
        for (function, set) in &self.options {
            for (option, entry) in set {
                if entry.uniform.trim().is_empty() {
                    issues.push(format!(
                        "option '{function}.{option}' names no uniform"
                    ));
                }
            }
        }
        issues
    }

    /// The manifest's option tables in the preprocessor's shape.
    pub fn into_options(self) -> ModuleOptions {
        self.options
    }
}
