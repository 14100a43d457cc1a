//! Data model shared by the parser, module, and compilation layers.
//!
//! This module defines the shapes every other part of the preprocessor talks
//! in: the closed GLSL type set, the declarations the parser recognises
//! (uniforms, imports, functions with their dependency references), and the
//! option metadata that maps user-facing knob names onto GLSL uniforms.
//!
//! At a glance
//!
//! ```text
//! GLSL text ──▶ Parser ──▶ ParseResult
//!                             │ imports:   ShaderImport
//!                             │ uniforms:  ShaderUniform
//!                             └ functions: ShaderFunction { deps: DepRef }
//!
//! ModuleOptions ──▶ RuntimeRegistry::resolve_options ──▶ driver uniform upload
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The GLSL types the preprocessor recognises in uniform and function
/// declarations. Anything outside this set is ignored by the scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlslType {
    Void,
    Float,
    Int,
    Uint,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
    Sampler3D,
    Sampler2DArray,
}

impl GlslType {
    /// Parses a single GLSL keyword into a type, or `None` when the keyword
    /// is not part of the recognised set.
    pub fn parse(keyword: &str) -> Option<Self> {
        let ty = match keyword {
            "void" => Self::Void,
            "float" => Self::Float,
            "int" => Self::Int,
            "uint" => Self::Uint,
            "bool" => Self::Bool,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "uvec2" => Self::UVec2,
            "uvec3" => Self::UVec3,
            "uvec4" => Self::UVec4,
            "bvec2" => Self::BVec2,
            "bvec3" => Self::BVec3,
            "bvec4" => Self::BVec4,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            "samplerCube" => Self::SamplerCube,
            "sampler3D" => Self::Sampler3D,
            "sampler2DArray" => Self::Sampler2DArray,
            _ => return None,
        };
        Some(ty)
    }

    /// The GLSL keyword for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Float => "float",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Bool => "bool",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UVec2 => "uvec2",
            Self::UVec3 => "uvec3",
            Self::UVec4 => "uvec4",
            Self::BVec2 => "bvec2",
            Self::BVec3 => "bvec3",
            Self::BVec4 => "bvec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::SamplerCube => "samplerCube",
            Self::Sampler3D => "sampler3D",
            Self::Sampler2DArray => "sampler2DArray",
        }
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GLSL profile selected by the `#version` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslVersion {
    /// WebGL 1 / GLSL ES 1.00 (no directive present).
    Gl1,
    /// WebGL 2 / GLSL ES 3.00 (`#version 300 es`).
    Gl2,
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gl1 => f.write_str("GLSL ES 1.00"),
            Self::Gl2 => f.write_str("GLSL ES 3.00"),
        }
    }
}

/// A typed name, as it appears in a function parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlslVariable {
    pub name: String,
    pub ty: GlslType,
}

/// A uniform declaration recognised in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderUniform {
    pub name: String,
    pub ty: GlslType,
    /// Array length for `T name[N]` declarations.
    pub array_len: Option<u32>,
    /// 1-based source line of the declaration; 0 for synthesised uniforms.
    pub line: usize,
}

impl ShaderUniform {
    /// Renders the declaration as a single GLSL line.
    pub fn declaration(&self) -> String {
        match self.array_len {
            Some(len) => format!("uniform {} {}[{}];", self.ty, self.name, len),
            None => format!("uniform {} {};", self.ty, self.name),
        }
    }
}

/// An `#import` directive recognised in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderImport {
    /// Function name inside the module.
    pub name: String,
    /// Local name the shader calls; equals `name` when no `as` clause.
    pub alias: String,
    /// Module path, e.g. `sandbox/colors`.
    pub module: String,
    /// 1-based source line of the directive.
    pub line: usize,
}

/// What a dependency reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Function,
    Uniform,
}

/// One textual reference inside a function body. `index` is the byte offset
/// of the identifier within the body string, so rewrites applied from the
/// highest offset downward never invalidate earlier offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepRef {
    pub kind: DepKind,
    pub name: String,
    pub index: usize,
}

/// A function definition recognised in the source. `body` is the exact
/// substring between and including the braces.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderFunction {
    pub name: String,
    pub return_type: GlslType,
    pub params: Vec<GlslVariable>,
    pub body: String,
    pub deps: Vec<DepRef>,
    /// 1-based source line of the function header.
    pub line: usize,
}

impl ShaderFunction {
    /// Renders the full definition: `returnType name(params) body`.
    pub fn render(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({}) {}", self.return_type, self.name, params, self.body)
    }
}

/// Everything the parser extracts from one GLSL source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub version: GlslVersion,
    pub imports: Vec<ShaderImport>,
    pub uniforms: Vec<ShaderUniform>,
    pub functions: Vec<ShaderFunction>,
}

impl ParseResult {
    pub fn function(&self, name: &str) -> Option<&ShaderFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn uniform(&self, name: &str) -> Option<&ShaderUniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

/// A value a driver can push into a uniform. Deserialises from plain TOML
/// scalars and arrays (`0.5`, `[1.0, 0.0, 0.0]`, nested arrays for matrices
/// and uniform arrays).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniformValue {
    Bool(bool),
    Number(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

/// One user-facing option: the uniform it feeds and an optional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOption {
    pub uniform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<UniformValue>,
}

/// Option name → option, for one function.
pub type OptionSet = BTreeMap<String, ModuleOption>;

/// Function name → its option set. The reserved key `default` holds options
/// inherited by every function until normalisation distributes it.
pub type ModuleOptions = BTreeMap<String, OptionSet>;

/// Key under which shared options are declared before normalisation.
pub const DEFAULT_OPTIONS_KEY: &str = "default";

/// Uniforms the host environment provides to every shader. Their names are
/// never namespaced and their declarations are injected at most once.
pub const BUILTIN_UNIFORMS: [(&str, GlslType); 5] = [
    ("u_resolution", GlslType::Vec2),
    ("u_time", GlslType::Float),
    ("u_delta", GlslType::Float),
    ("u_mouse", GlslType::Vec2),
    ("u_frame", GlslType::Int),
];

/// Whether `name` is one of the host-provided uniforms.
pub fn is_builtin_uniform(name: &str) -> bool {
    BUILTIN_UNIFORMS.iter().any(|(builtin, _)| *builtin == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_round_trip_keywords() {
        for keyword in ["float", "vec3", "mat4", "sampler2DArray", "uint"] {
            let ty = GlslType::parse(keyword).expect(keyword);
            assert_eq!(ty.as_str(), keyword);
        }
        assert!(GlslType::parse("double").is_none());
        assert!(GlslType::parse("Vec3").is_none());
    }

    #[test]
    fn renders_uniform_declarations() {
        let plain = ShaderUniform {
            name: "u_speed".into(),
            ty: GlslType::Float,
            array_len: None,
            line: 1,
        };
        assert_eq!(plain.declaration(), "uniform float u_speed;");

        let array = ShaderUniform {
            name: "u_colors".into(),
            ty: GlslType::Vec3,
            array_len: Some(2),
            line: 1,
        };
        assert_eq!(array.declaration(), "uniform vec3 u_colors[2];");
    }

    #[test]
    fn recognises_builtin_uniforms() {
        assert!(is_builtin_uniform("u_time"));
        assert!(is_builtin_uniform("u_resolution"));
        assert!(!is_builtin_uniform("u_speed"));
        assert!(!is_builtin_uniform("time"));
    }
}
