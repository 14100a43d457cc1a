//! GLSL `#import` preprocessor for the shader sandbox.
//!
//! Fragment shaders written for the sandbox may pull named functions out of
//! registered modules:
//!
//! ```text
//! #import gradient from 'sandbox/colors'
//! #import fbm as clouds from 'sandbox'
//!
//! void main() {
//!     vec3 sky = gradient(clouds(u_mouse), vec3(0.1), vec3(0.9));
//! }
//! ```
//!
//! Compilation resolves each directive against the design-time
//! [`ModuleRegistry`], tree-shakes the imported function's helper and
//! uniform closure out of the module, rewrites every pulled name under a
//! per-import namespace prefix so repeat imports never collide, and splices
//! the results back into the user source. The per-import module copies land
//! in the [`RuntimeRegistry`] with their option tables pointing at the
//! namespaced uniform names, which is how a driver maps `set_option` calls
//! onto uniform uploads.
//!
//! The output is plain GLSL of the same `#version` profile, ready for the
//! GPU compiler.

mod builtins;
mod compile;
mod error;
mod module;
mod parse;
mod registry;
mod shader;
mod types;

pub use compile::Compilable;
pub use error::{ErrorCode, SandboxError};
pub use module::{ExtractionDependencies, FunctionExtraction, Module, ModuleDefinition};
pub use parse::Parser;
pub use registry::{is_reserved_module_name, ModuleRegistry, RuntimeRegistry};
pub use shader::Shader;
pub use types::{
    is_builtin_uniform, DepKind, DepRef, GlslType, GlslVariable, GlslVersion, ModuleOption,
    ModuleOptions, OptionSet, ParseResult, ShaderFunction, ShaderImport, ShaderUniform,
    UniformValue, BUILTIN_UNIFORMS, DEFAULT_OPTIONS_KEY,
};
