//! Import resolution, namespacing, and source splicing.
//!
//! `Compilable` is the unit both shaders and modules build on: two parsers
//! over the same text (pristine and compiled), a bag of required uniforms
//! and rewritten functions, and the pipeline that turns `#import` directives
//! into spliced GLSL. The overall flow per import:
//!
//! ```text
//! #import fn as alias from 'mod'
//!        │ resolve in design-time registry
//!        ▼
//! Module::copy ──▶ extract(fn) ──▶ { fn, helpers, uniforms }
//!        │ namespace prefix: alias + "_" + 6 random base-36 chars
//!        ▼
//! rewrite helper + uniform refs ──▶ requirements bag
//!        │ options rewritten to the namespaced uniform names
//!        ▼
//! runtime registry adopts the copy under the module key
//! ```
//!
//! After all imports are processed the directives are stripped, uniform
//! declarations and function definitions are spliced in at their insertion
//! points, and blank-line runs are collapsed. Compilation is idempotent
//! until `recompile` or `set_source` resets it.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::SandboxError;
use crate::parse::{looks_like_import, scan_functions, uniform_on_line, Parser};
use crate::registry::{ModuleRegistry, RuntimeRegistry};
use crate::types::{
    is_builtin_uniform, DepKind, DepRef, GlslVersion, ParseResult, ShaderFunction, ShaderImport,
    ShaderUniform,
};

const SUFFIX_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

/// A GLSL unit that can resolve its imports into plain GLSL.
#[derive(Debug, Clone)]
pub struct Compilable {
    original: Parser,
    compiled: Parser,
    /// Uniform requirements that survive resets, e.g. a shader's built-ins.
    seed_uniforms: Vec<ShaderUniform>,
    required_uniforms: BTreeMap<String, ShaderUniform>,
    required_functions: Vec<ShaderFunction>,
    compiled_flag: bool,
    rng: StdRng,
}

impl Compilable {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_rng(source, StdRng::from_entropy())
    }

    /// Deterministic namespace suffixes, for reproducible output.
    pub fn with_seed(source: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(source, StdRng::seed_from_u64(seed))
    }

    pub(crate) fn with_rng(source: impl Into<String>, rng: StdRng) -> Self {
        Self {
            original: Parser::new(source),
            compiled: Parser::new(""),
            seed_uniforms: Vec::new(),
            required_uniforms: BTreeMap::new(),
            required_functions: Vec::new(),
            compiled_flag: false,
            rng,
        }
    }

    /// A new, uncompiled unit over the same source with cloned seeds.
    pub(crate) fn fresh_copy(&self) -> Self {
        let mut copy = Self::with_rng(self.original.source(), self.rng.clone());
        for uniform in &self.seed_uniforms {
            copy.require_uniform(uniform.clone());
        }
        copy
    }

    /// Registers a uniform that must appear in the compiled output whether or
    /// not the source references it. Seeds survive `set_source` and
    /// `recompile`.
    pub fn require_uniform(&mut self, uniform: ShaderUniform) {
        self.required_uniforms
            .insert(uniform.name.clone(), uniform.clone());
        self.seed_uniforms.push(uniform);
    }

    pub fn source(&self) -> &str {
        self.original.source()
    }

    /// Replaces the source and discards all compilation state.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.original.set_source(source);
        self.reset();
    }

    pub fn version(&self) -> GlslVersion {
        self.original.version()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled_flag
    }

    /// The compiled text, when `compile` has run.
    pub fn compiled_source(&self) -> Option<&str> {
        self.compiled_flag.then(|| self.compiled.source())
    }

    /// Parse of the pristine source.
    pub fn parse(&mut self) -> Result<&ParseResult, SandboxError> {
        self.original.parse()
    }

    /// Parse of the compiled source; only meaningful after `compile`.
    pub fn compiled_parse(&mut self) -> Result<&ParseResult, SandboxError> {
        self.compiled.parse()
    }

    /// Uniforms the compiled output must declare, keyed by final name.
    pub fn required_uniforms(&self) -> &BTreeMap<String, ShaderUniform> {
        &self.required_uniforms
    }

    fn reset(&mut self) {
        self.compiled_flag = false;
        self.compiled.set_source("");
        self.required_functions.clear();
        self.required_uniforms = self
            .seed_uniforms
            .iter()
            .map(|u| (u.name.clone(), u.clone()))
            .collect();
    }

    /// Resolves every import and produces the compiled source. Idempotent:
    /// repeated calls return the cached text until [`Self::recompile`].
    pub fn compile(
        &mut self,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<&str, SandboxError> {
        if self.compiled_flag {
            return Ok(self.compiled.source());
        }

        let parsed = self.original.parse()?.clone();

        if parsed.imports.is_empty() {
            let patched =
                insert_required_uniforms(self.original.source(), &self.required_uniforms)?;
            self.compiled.set_source(collapse_blank_runs(&patched));
            self.compiled_flag = true;
            return Ok(self.compiled.source());
        }

        for import in &parsed.imports {
            self.resolve_import(import, design, runtime)?;
        }

        let stripped = strip_import_lines(self.original.source());
        let with_uniforms = insert_required_uniforms(&stripped, &self.required_uniforms)?;
        let with_functions = insert_required_functions(&with_uniforms, &self.required_functions)?;
        self.compiled
            .set_source(collapse_blank_runs(&with_functions));
        self.compiled_flag = true;

        debug!(
            imports = parsed.imports.len(),
            uniforms = self.required_uniforms.len(),
            functions = self.required_functions.len(),
            "compiled shader source"
        );
        Ok(self.compiled.source())
    }

    /// Drops the cached result and compiles again with fresh namespaces.
    pub fn recompile(
        &mut self,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<&str, SandboxError> {
        self.reset();
        self.compile(design, runtime)
    }

    fn resolve_import(
        &mut self,
        import: &ShaderImport,
        design: &ModuleRegistry,
        runtime: &mut RuntimeRegistry,
    ) -> Result<(), SandboxError> {
        let module = design.resolve(&import.module)?;
        let mut copy = module.copy();
        let extraction = copy.extract(&import.name, design, runtime)?;
        let prefix = format!("{}_{}", import.alias, random_suffix(&mut self.rng));
        debug!(
            module = %import.module,
            function = %import.name,
            alias = %import.alias,
            prefix = %prefix,
            helpers = extraction.dependencies.functions.len(),
            "resolved import"
        );

        let helper_names: BTreeSet<&str> = extraction
            .dependencies
            .functions
            .iter()
            .map(|f| f.name.as_str())
            .collect();

        for helper in &extraction.dependencies.functions {
            let mut rewritten = helper.clone();
            rewritten.body = rewrite_body(&helper.body, &helper.deps, &prefix, &helper_names);
            rewritten.name = format!("{prefix}_{}", helper.name);
            rewritten.deps = Vec::new();
            self.push_required_function(rewritten);
        }

        let target = &extraction.function;
        let mut entry = target.clone();
        entry.body = rewrite_body(&target.body, &target.deps, &prefix, &helper_names);
        entry.name = import.alias.clone();
        entry.deps = Vec::new();
        self.push_required_function(entry);

        let mut namespaced: BTreeSet<&str> = BTreeSet::new();
        for uniform in &extraction.dependencies.uniforms {
            if is_builtin_uniform(&uniform.name) {
                continue;
            }
            namespaced.insert(uniform.name.as_str());
            let name = format!("{prefix}_{}", uniform.name);
            self.required_uniforms
                .entry(name.clone())
                .or_insert(ShaderUniform {
                    name,
                    ty: uniform.ty,
                    array_len: uniform.array_len,
                    line: 0,
                });
        }

        copy.rewrite_options(&import.name, &import.alias, &prefix, &namespaced);
        runtime.adopt(&import.module, copy);
        Ok(())
    }

    fn push_required_function(&mut self, function: ShaderFunction) {
        if self
            .required_functions
            .iter()
            .any(|existing| existing.name == function.name)
        {
            return;
        }
        self.required_functions.push(function);
    }
}

fn random_suffix(rng: &mut StdRng) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Applies namespace rewrites to one function body. References are replaced
/// from the highest offset downward so earlier offsets stay valid. Uniform
/// references keep their name when they point at a host built-in; function
/// references are only touched when they name an extracted helper.
fn rewrite_body(
    body: &str,
    deps: &[DepRef],
    prefix: &str,
    helper_names: &BTreeSet<&str>,
) -> String {
    let mut ordered: Vec<&DepRef> = deps.iter().collect();
    ordered.sort_by(|a, b| b.index.cmp(&a.index));

    let mut rewritten = body.to_string();
    for dep in ordered {
        let replace = match dep.kind {
            DepKind::Uniform => !is_builtin_uniform(&dep.name),
            DepKind::Function => helper_names.contains(dep.name.as_str()),
        };
        if !replace {
            continue;
        }
        let end = dep.index + dep.name.len();
        rewritten.replace_range(dep.index..end, &format!("{prefix}_{}", dep.name));
    }
    rewritten
}

/// Removes every import directive, plus the blank line directly after one.
fn strip_import_lines(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut after_import = false;
    for line in text.lines() {
        if looks_like_import(line) {
            after_import = true;
            continue;
        }
        if after_import && line.trim().is_empty() {
            after_import = false;
            continue;
        }
        after_import = false;
        kept.push(line);
    }
    rejoin(kept, text)
}

/// Splices missing required uniform declarations in as one block: after the
/// last declared uniform, or after the version/precision/comment prologue.
/// A required name that is already declared with another type is a fault.
fn insert_required_uniforms(
    text: &str,
    required: &BTreeMap<String, ShaderUniform>,
) -> Result<String, SandboxError> {
    let lines: Vec<&str> = text.lines().collect();
    let declared: Vec<ShaderUniform> = lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| uniform_on_line(line, idx + 1))
        .collect();

    let mut missing: Vec<&ShaderUniform> = Vec::new();
    for requirement in required.values() {
        match declared.iter().find(|d| d.name == requirement.name) {
            Some(existing) if existing.ty == requirement.ty => {}
            Some(existing) => {
                return Err(SandboxError::UniformTypeConflict {
                    name: requirement.name.clone(),
                    expected: requirement.ty,
                    actual: existing.ty,
                })
            }
            None => missing.push(requirement),
        }
    }
    if missing.is_empty() {
        return Ok(text.to_string());
    }

    let insert_at = match declared.last() {
        Some(last) => last.line,
        None => prologue_len(&lines),
    };

    let mut patched: Vec<&str> = Vec::with_capacity(lines.len() + missing.len() + 2);
    patched.extend(&lines[..insert_at]);
    let block: Vec<String> = missing.iter().map(|u| u.declaration()).collect();
    if insert_at > 0 {
        patched.push("");
    }
    patched.extend(block.iter().map(String::as_str));
    patched.push("");
    patched.extend(&lines[insert_at..]);
    Ok(rejoin(patched, text))
}

/// Splices the rewritten functions in just before the first declared
/// function; faults when the host text has none to anchor on.
fn insert_required_functions(
    text: &str,
    functions: &[ShaderFunction],
) -> Result<String, SandboxError> {
    if functions.is_empty() {
        return Ok(text.to_string());
    }

    let declared = scan_functions(text, &[]);
    let Some(first) = declared.first() else {
        return Err(SandboxError::MissingFunction);
    };
    let cut = first.line - 1;

    let lines: Vec<&str> = text.lines().collect();
    let rendered: Vec<String> = functions.iter().map(ShaderFunction::render).collect();

    let mut patched: Vec<&str> = Vec::with_capacity(lines.len() + rendered.len() * 2);
    patched.extend(&lines[..cut]);
    for definition in &rendered {
        patched.push(definition.as_str());
        patched.push("");
    }
    patched.extend(&lines[cut..]);
    Ok(rejoin(patched, text))
}

/// Number of leading lines taken up by the version directive, precision
/// qualifiers, comments, and blanks.
fn prologue_len(lines: &[&str]) -> usize {
    let mut in_block_comment = false;
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if in_block_comment {
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
            continue;
        }
        if trimmed.is_empty()
            || trimmed.starts_with("//")
            || trimmed.starts_with("#version")
            || trimmed.starts_with("precision")
        {
            continue;
        }
        if trimmed.starts_with("/*") {
            if !trimmed.contains("*/") {
                in_block_comment = true;
            }
            continue;
        }
        return idx;
    }
    lines.len()
}

/// Collapses runs of three or more newlines down to exactly two.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut consecutive = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            consecutive += 1;
            if consecutive <= 2 {
                out.push(ch);
            }
        } else {
            consecutive = 0;
            out.push(ch);
        }
    }
    out
}

fn rejoin(lines: Vec<&str>, text: &str) -> String {
    let mut joined = lines.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}
