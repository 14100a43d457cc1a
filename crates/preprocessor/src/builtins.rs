//! The bundled `sandbox` module library.
//!
//! Four modules ship with every design-time registry: the core noise
//! toolbox under `sandbox`, and the `colors`, `effects`, and `filters`
//! families under `sandbox/…`. Their GLSL lives here as plain source text;
//! the option tables map user-facing knob names onto the uniforms each
//! function reads.

use std::collections::BTreeMap;

use crate::error::SandboxError;
use crate::module::Module;
use crate::registry::ModuleRegistry;
use crate::types::{ModuleOption, ModuleOptions, OptionSet, UniformValue, DEFAULT_OPTIONS_KEY};

const CORE: &str = r"float hash(vec2 p) {
    vec3 p3 = fract(vec3(p.xyx) * 0.1031);
    p3 += dot(p3, p3.yzx + 33.33);
    return fract((p3.x + p3.y) * p3.z);
}

float noise(vec2 p) {
    vec2 i = floor(p);
    vec2 f = fract(p);
    vec2 u = f * f * (3.0 - 2.0 * f);
    float a = hash(i);
    float b = hash(i + vec2(1.0, 0.0));
    float c = hash(i + vec2(0.0, 1.0));
    float d = hash(i + vec2(1.0, 1.0));
    return mix(mix(a, b, u.x), mix(c, d, u.x), u.y);
}

float fbm(vec2 p) {
    float value = 0.0;
    float amplitude = 0.5;
    for (int i = 0; i < 5; i++) {
        value += amplitude * noise(p);
        p *= 2.0;
        amplitude *= 0.5;
    }
    return value;
}

float turbulence(vec2 p) {
    float value = 0.0;
    float amplitude = 0.5;
    for (int i = 0; i < 5; i++) {
        value += amplitude * abs(noise(p) * 2.0 - 1.0);
        p *= 2.0;
        amplitude *= 0.5;
    }
    return value;
}

vec2 rotate(vec2 p, float angle) {
    float s = sin(angle);
    float c = cos(angle);
    return mat2(c, -s, s, c) * p;
}
";

const COLORS: &str = r"uniform vec3 u_colors[2];

vec3 gradient(float t, vec3 from, vec3 to) {
    float mixer = clamp(t, 0.0, 1.0);
    vec3 tint = mix(u_colors[0], u_colors[1], mixer);
    return mix(from, to, mixer) * tint;
}

vec3 palette(float t) {
    return mix(u_colors[0], u_colors[1], 0.5 + 0.5 * cos(6.2831853 * t));
}

float luma(vec3 color) {
    return dot(color, vec3(0.299, 0.587, 0.114));
}
";

const EFFECTS: &str = r"uniform float u_intensity;

float pulse(float t) {
    return 0.5 + 0.5 * sin(t * u_intensity);
}

vec3 glow(vec3 color, float dist) {
    return color * (u_intensity / max(dist, 0.0001));
}

float vignette(vec2 uv) {
    vec2 centered = uv - 0.5;
    return 1.0 - dot(centered, centered) * u_intensity;
}
";

const FILTERS: &str = r"uniform float u_radius;
uniform float u_cells;

float blur(float dist) {
    float radius = max(u_radius, 0.0001);
    return exp(-(dist * dist) / (2.0 * radius * radius));
}

vec2 pixelate(vec2 uv) {
    float cells = max(u_cells, 1.0);
    return (floor(uv * cells) + 0.5) / cells;
}

vec3 posterize(vec3 color) {
    float cells = max(u_cells, 1.0);
    return floor(color * cells) / cells;
}
";

fn option(uniform: &str, default: UniformValue) -> ModuleOption {
    ModuleOption {
        uniform: uniform.to_string(),
        default: Some(default),
    }
}

fn colors_options() -> ModuleOptions {
    let mut set: OptionSet = BTreeMap::new();
    set.insert(
        "colors".to_string(),
        option(
            "u_colors",
            UniformValue::Matrix(vec![vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 0.0]]),
        ),
    );

    let mut options: ModuleOptions = BTreeMap::new();
    options.insert("gradient".to_string(), set.clone());
    options.insert("palette".to_string(), set);
    options
}

fn effects_options() -> ModuleOptions {
    let mut defaults: OptionSet = BTreeMap::new();
    defaults.insert(
        "intensity".to_string(),
        option("u_intensity", UniformValue::Number(1.0)),
    );

    // Every effect reads u_intensity, so the shared entry covers them all.
    let mut options: ModuleOptions = BTreeMap::new();
    options.insert(DEFAULT_OPTIONS_KEY.to_string(), defaults);
    options
}

fn filters_options() -> ModuleOptions {
    let mut blur: OptionSet = BTreeMap::new();
    blur.insert(
        "radius".to_string(),
        option("u_radius", UniformValue::Number(4.0)),
    );

    let mut cells: OptionSet = BTreeMap::new();
    cells.insert(
        "cells".to_string(),
        option("u_cells", UniformValue::Number(64.0)),
    );

    let mut options: ModuleOptions = BTreeMap::new();
    options.insert("blur".to_string(), blur);
    options.insert("pixelate".to_string(), cells.clone());
    options.insert("posterize".to_string(), cells);
    options
}

/// Seeds `registry` with the bundled modules. Called once per design-time
/// registry; the reserved-name check intentionally does not apply here.
pub fn install(registry: &mut ModuleRegistry) -> Result<(), SandboxError> {
    registry.register(Module::new("sandbox", CORE, BTreeMap::new())?);
    registry.register(Module::new("sandbox/colors", COLORS, colors_options())?);
    registry.register(Module::new("sandbox/effects", EFFECTS, effects_options())?);
    registry.register(Module::new("sandbox/filters", FILTERS, filters_options())?);
    Ok(())
}
