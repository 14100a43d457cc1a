//! The user-facing fragment shader unit.
//!
//! A `Shader` is a [`Compilable`] whose requirements are pre-seeded with the
//! five host uniforms, so `u_resolution`, `u_time`, `u_delta`, `u_mouse`,
//! and `u_frame` always appear in the compiled output even when the author
//! never references them. GPU drivers quietly drop locations the compiler
//! optimised away, so over-declaring costs nothing. Shaders never contribute
//! functions of their own; they host user code and trigger compilation.

use std::collections::BTreeMap;

use crate::compile::Compilable;
use crate::error::SandboxError;
use crate::registry::{ModuleRegistry, RuntimeRegistry};
use crate::types::{GlslVersion, ParseResult, ShaderUniform, BUILTIN_UNIFORMS};

#[derive(Debug, Clone)]
pub struct Shader {
    inner: Compilable,
}

impl Shader {
    pub fn new(source: impl Into<String>) -> Self {
        Self::seeded(Compilable::new(source))
    }

    /// Deterministic namespace suffixes, for reproducible output.
    pub fn with_seed(source: impl Into<String>, seed: u64) -> Self {
        Self::seeded(Compilable::with_seed(source, seed))
    }

    fn seeded(mut inner: Compilable) -> Self {
        for (name, ty) in BUILTIN_UNIFORMS {
            inner.require_uniform(ShaderUniform {
                name: name.to_string(),
                ty,
                array_len: None,
                line: 0,
            });
        }
        Self { inner }
    }

    pub fn source(&self) -> &str {
        self.inner.source()
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.inner.set_source(source);
    }

    pub fn version(&self) -> GlslVersion {
        self.inner.version()
    }

    pub fn is_compiled(&self) -> bool {
        self.inner.is_compiled()
    }

    pub fn compiled_source(&self) -> Option<&str> {
        self.inner.compiled_source()
    }

    pub fn parse(&mut self) -> Result<&ParseResult, SandboxError> {
        self.inner.parse()
    }

    pub fn compiled_parse(&mut self) -> Result<&ParseResult, SandboxError> {
        self.inner.compiled_parse()
    }

    /// Uniforms the compiled output declares, keyed by final name.
    pub fn required_uniforms(&self) -> &BTreeMap<String, ShaderUniform> {
        self.inner.required_uniforms()
    }

    /// Compiles the shader. The author must define at least one function;
    /// a function-less fragment source can never render.
    pub fn compile(
        &mut self,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<&str, SandboxError> {
        if self.inner.parse()?.functions.is_empty() {
            return Err(SandboxError::MissingFunction);
        }
        self.inner.compile(design, runtime)
    }

    /// Drops the cached result and compiles again with fresh namespaces.
    pub fn recompile(
        &mut self,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<&str, SandboxError> {
        if self.inner.parse()?.functions.is_empty() {
            return Err(SandboxError::MissingFunction);
        }
        self.inner.recompile(design, runtime)
    }
}
