//! A registered GLSL unit and the function-closure extraction it offers.
//!
//! A `Module` wraps a [`Compilable`] over its source plus the caller-supplied
//! option metadata. Construction distributes the reserved `default` option
//! set over every function that does not override it. `extract` is the
//! tree-shaking entry point: it compiles the module (resolving any imports
//! the module itself carries), locates the requested function, and walks its
//! dependency graph so only the helpers and uniforms the function actually
//! reaches leave the module.

use std::collections::BTreeSet;

use crate::compile::Compilable;
use crate::error::SandboxError;
use crate::registry::{ModuleRegistry, RuntimeRegistry};
use crate::types::{
    DepKind, ModuleOptions, ParseResult, ShaderFunction, ShaderUniform, DEFAULT_OPTIONS_KEY,
};

/// The helpers and uniforms a function transitively reaches.
#[derive(Debug, Clone, Default)]
pub struct ExtractionDependencies {
    /// Reached helper functions, callees before callers.
    pub functions: Vec<ShaderFunction>,
    /// Reached uniform declarations, deduplicated by name.
    pub uniforms: Vec<ShaderUniform>,
}

/// One extracted function with its dependency closure.
#[derive(Debug, Clone)]
pub struct FunctionExtraction {
    pub function: ShaderFunction,
    pub dependencies: ExtractionDependencies,
}

/// Public description of a compiled module.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    pub name: String,
    /// Importable function names; `main` and `default` are excluded.
    pub methods: Vec<String>,
    pub uniforms: Vec<ShaderUniform>,
    pub options: ModuleOptions,
}

/// A named, parseable GLSL unit with option-to-uniform metadata.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    options: ModuleOptions,
    inner: Compilable,
}

impl Module {
    /// Builds a module and normalises its options: a `default` entry is
    /// shallow-merged under every function's own overrides, then removed.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        options: ModuleOptions,
    ) -> Result<Self, SandboxError> {
        let mut inner = Compilable::new(source);
        let options = normalise_options(options, &mut inner)?;
        Ok(Self {
            name: name.into(),
            options,
            inner,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        self.inner.source()
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    pub(crate) fn options_mut(&mut self) -> &mut ModuleOptions {
        &mut self.options
    }

    pub(crate) fn into_options(self) -> ModuleOptions {
        self.options
    }

    /// An independent module over the same source: options deep-cloned,
    /// compilation state fresh.
    pub fn copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            options: self.options.clone(),
            inner: self.inner.fresh_copy(),
        }
    }

    /// Resolves the module's own imports; idempotent like
    /// [`Compilable::compile`].
    pub fn compile(
        &mut self,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<&str, SandboxError> {
        self.inner.compile(design, runtime)
    }

    /// The compiled text, when `compile` has run.
    pub fn compiled_source(&self) -> Option<&str> {
        self.inner.compiled_source()
    }

    pub(crate) fn compiled_parse(&mut self) -> Result<&ParseResult, SandboxError> {
        self.inner.compiled_parse()
    }

    /// Compiles a scratch copy and describes what the module exports. The
    /// stored module itself stays untouched.
    pub fn definition(&self, design: &ModuleRegistry) -> Result<ModuleDefinition, SandboxError> {
        let mut scratch = self.copy();
        let mut runtime = RuntimeRegistry::new();
        scratch.compile(design, &mut runtime)?;
        let parsed = scratch.compiled_parse()?;

        let methods = parsed
            .functions
            .iter()
            .map(|f| f.name.clone())
            .filter(|name| name != "main" && name != DEFAULT_OPTIONS_KEY)
            .collect();
        Ok(ModuleDefinition {
            name: self.name.clone(),
            methods,
            uniforms: parsed.uniforms.clone(),
            options: self.options.clone(),
        })
    }

    /// Extracts `function` together with the transitive closure of helpers
    /// and uniforms it references. Function references that do not match a
    /// parsed function are assumed to be GLSL built-ins and dropped; cycles
    /// stop the walk instead of failing.
    pub fn extract(
        &mut self,
        function: &str,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<FunctionExtraction, SandboxError> {
        if function == "main" || function == DEFAULT_OPTIONS_KEY {
            return Err(SandboxError::ReservedFunction(function.to_string()));
        }

        self.inner.compile(design, runtime)?;
        let parsed = self.inner.compiled_parse()?.clone();
        let Some(target) = parsed.function(function) else {
            return Err(SandboxError::FunctionNotFound {
                module: self.name.clone(),
                function: function.to_string(),
            });
        };

        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(function.to_string());
        let mut dependencies = ExtractionDependencies::default();
        let mut seen_uniforms: BTreeSet<String> = BTreeSet::new();
        collect_dependencies(
            target,
            &parsed,
            &mut visited,
            &mut dependencies,
            &mut seen_uniforms,
        );

        Ok(FunctionExtraction {
            function: target.clone(),
            dependencies,
        })
    }

    /// Points option entries for `function` at their namespaced uniforms and
    /// refiles the entry under the alias when the import renamed it.
    pub(crate) fn rewrite_options(
        &mut self,
        function: &str,
        alias: &str,
        prefix: &str,
        namespaced_uniforms: &BTreeSet<&str>,
    ) {
        if let Some(set) = self.options.get_mut(function) {
            for option in set.values_mut() {
                if namespaced_uniforms.contains(option.uniform.as_str()) {
                    option.uniform = format!("{prefix}_{}", option.uniform);
                }
            }
        }
        if alias != function {
            if let Some(set) = self.options.remove(function) {
                self.options.insert(alias.to_string(), set);
            }
        }
    }
}

/// Depth-first post-order walk: each helper is pushed after its own callees,
/// so emitted definitions always precede their uses.
fn collect_dependencies(
    function: &ShaderFunction,
    parsed: &ParseResult,
    visited: &mut BTreeSet<String>,
    dependencies: &mut ExtractionDependencies,
    seen_uniforms: &mut BTreeSet<String>,
) {
    for dep in &function.deps {
        match dep.kind {
            DepKind::Function => {
                if visited.contains(&dep.name) {
                    continue;
                }
                let Some(callee) = parsed.function(&dep.name) else {
                    continue;
                };
                visited.insert(dep.name.clone());
                collect_dependencies(callee, parsed, visited, dependencies, seen_uniforms);
                dependencies.functions.push(callee.clone());
            }
            DepKind::Uniform => {
                if seen_uniforms.insert(dep.name.clone()) {
                    if let Some(uniform) = parsed.uniform(&dep.name) {
                        dependencies.uniforms.push(uniform.clone());
                    }
                }
            }
        }
    }
}

fn normalise_options(
    mut options: ModuleOptions,
    inner: &mut Compilable,
) -> Result<ModuleOptions, SandboxError> {
    let Some(defaults) = options.remove(DEFAULT_OPTIONS_KEY) else {
        return Ok(options);
    };

    let function_names: Vec<String> = inner
        .parse()?
        .functions
        .iter()
        .map(|f| f.name.clone())
        .filter(|name| name != "main" && name != DEFAULT_OPTIONS_KEY)
        .collect();

    for name in function_names {
        let set = options.entry(name).or_default();
        for (key, option) in &defaults {
            set.entry(key.clone()).or_insert_with(|| option.clone());
        }
    }
    Ok(options)
}
