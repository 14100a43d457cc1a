//! End-to-end compilation scenarios over the bundled and user modules.

use std::collections::BTreeMap;

use preprocessor::{
    ErrorCode, ModuleOption, ModuleOptions, ModuleRegistry, OptionSet, RuntimeRegistry,
    SandboxError, Shader, UniformValue,
};

fn builtin_registry() -> ModuleRegistry {
    ModuleRegistry::with_builtins().expect("builtin modules compile")
}

fn compile(shader: &mut Shader, design: &ModuleRegistry) -> (String, RuntimeRegistry) {
    let mut runtime = RuntimeRegistry::new();
    let compiled = shader
        .compile(design, &mut runtime)
        .expect("compilation succeeds")
        .to_string();
    (compiled, runtime)
}

fn intensity_module_options() -> ModuleOptions {
    let mut set: OptionSet = BTreeMap::new();
    set.insert(
        "intensity".to_string(),
        ModuleOption {
            uniform: "u_intensity".into(),
            default: Some(UniformValue::Number(1.0)),
        },
    );
    let mut options: ModuleOptions = BTreeMap::new();
    options.insert("effect".to_string(), set);
    options
}

const EFFECT_MODULE: &str = r"uniform float u_intensity;

vec3 effect(float x) {
    return vec3(x * u_intensity);
}
";

#[test]
fn simple_import_without_alias() {
    let design = builtin_registry();
    let source = r"#import gradient from 'sandbox/colors'

void main() {
    vec3 c = gradient(0.5, vec3(1.0), vec3(0.0));
}
";
    let mut shader = Shader::with_seed(source, 42);
    let (compiled, runtime) = compile(&mut shader, &design);

    assert!(!compiled.contains("#import"));

    // The imported function keeps its name because no alias was given.
    let definition = compiled.find("vec3 gradient(").expect("definition spliced");
    let call_site = compiled.find("gradient(0.5").expect("user code untouched");
    assert!(definition < call_site);

    // Its uniform arrives namespaced, with the array length preserved.
    let uniform_line = compiled
        .lines()
        .find(|line| line.starts_with("uniform vec3 gradient_"))
        .expect("namespaced uniform declared");
    assert!(uniform_line.ends_with("_u_colors[2];"), "{uniform_line}");

    // The runtime registry exposes the option under the function name.
    let options = runtime
        .resolve_options("gradient")
        .expect("options registered");
    let colors = &options["colors"];
    assert!(colors.uniform.starts_with("gradient_"));
    assert!(colors.uniform.ends_with("_u_colors"));
    assert_eq!(
        colors.default,
        Some(UniformValue::Matrix(vec![
            vec![1.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0],
        ]))
    );
}

#[test]
fn double_alias_of_one_function() {
    let mut design = builtin_registry();
    design
        .define("m", EFFECT_MODULE, intensity_module_options())
        .unwrap();

    let source = r"#import effect as soft from 'm'
#import effect as hard from 'm'

void main() {
    vec3 a = soft(0.0);
    vec3 b = hard(1.0);
}
";
    let mut shader = Shader::with_seed(source, 7);
    let (compiled, runtime) = compile(&mut shader, &design);

    assert!(compiled.contains("vec3 soft("));
    assert!(compiled.contains("vec3 hard("));

    let uniform_lines: Vec<&str> = compiled
        .lines()
        .filter(|line| {
            line.starts_with("uniform float ") && line.trim_end().ends_with("_u_intensity;")
        })
        .collect();
    assert_eq!(uniform_lines.len(), 2, "{compiled}");
    assert!(uniform_lines.iter().any(|l| l.contains(" soft_")));
    assert!(uniform_lines.iter().any(|l| l.contains(" hard_")));

    let soft = runtime.resolve_options("soft").expect("soft registered");
    let hard = runtime.resolve_options("hard").expect("hard registered");
    assert_ne!(soft["intensity"].uniform, hard["intensity"].uniform);
    assert!(soft["intensity"].uniform.starts_with("soft_"));
    assert!(hard["intensity"].uniform.starts_with("hard_"));
}

#[test]
fn tree_shaking_pulls_only_the_reachable_chain() {
    let design = builtin_registry();
    let source = r"#import fbm from 'sandbox'

void main() {
    float n = fbm(vec2(0.5));
}
";
    let mut shader = Shader::with_seed(source, 3);
    let (compiled, _) = compile(&mut shader, &design);

    let hash = compiled.find("_hash(vec2").expect("hash pulled");
    let noise = compiled.find("_noise(vec2").expect("noise pulled");
    let fbm = compiled.find("float fbm(vec2").expect("fbm spliced");

    // Callees precede their callers, which precede the entry point.
    assert!(hash < noise && noise < fbm);
    assert!(!compiled.contains("turbulence"));
    assert!(!compiled.contains("rotate"));
}

#[test]
fn cascading_module_imports_resolve_recursively() {
    let mut design = builtin_registry();
    design
        .define(
            "warp",
            r"#import hash from 'sandbox'

float warp(vec2 p) {
    return hash(p * 2.0);
}
",
            BTreeMap::new(),
        )
        .unwrap();

    let source = r"#import warp from 'warp'

void main() {
    float w = warp(vec2(0.1));
}
";
    let mut shader = Shader::with_seed(source, 11);
    let (compiled, _) = compile(&mut shader, &design);

    assert!(!compiled.contains("#import"));
    assert!(compiled.contains("float warp(vec2"));
    // The helper pulled through the nested module resolution.
    assert!(compiled.contains("_hash(vec2"));
}

#[test]
fn builtin_type_conflict_is_reported_with_both_types() {
    let design = builtin_registry();
    let mut shader = Shader::new("uniform vec4 u_time;\nvoid main() { }\n");
    let mut runtime = RuntimeRegistry::new();
    let err = shader.compile(&design, &mut runtime).unwrap_err();

    assert_eq!(err.code(), ErrorCode::Shader);
    match err {
        SandboxError::UniformTypeConflict {
            name,
            expected,
            actual,
        } => {
            assert_eq!(name, "u_time");
            assert_eq!(expected.as_str(), "float");
            assert_eq!(actual.as_str(), "vec4");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn import_syntax_fault_names_the_bad_prefix() {
    let design = builtin_registry();
    let mut shader = Shader::new("@import x from 'm'\nvoid main() { }\n");
    let mut runtime = RuntimeRegistry::new();
    let err = shader.compile(&design, &mut runtime).unwrap_err();

    assert_eq!(err.code(), ErrorCode::Shader);
    match err {
        SandboxError::ImportSyntax { line, detail } => {
            assert_eq!(line, 1);
            assert!(detail.contains("Invalid prefix '@'"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_module_fault_propagates() {
    let design = builtin_registry();
    let mut shader = Shader::new("#import x from 'nowhere'\nvoid main() { }\n");
    let mut runtime = RuntimeRegistry::new();
    let err = shader.compile(&design, &mut runtime).unwrap_err();
    assert_eq!(err, SandboxError::ModuleNotFound("nowhere".into()));
    assert_eq!(err.code(), ErrorCode::Module);
}

#[test]
fn importing_main_is_rejected() {
    let mut design = builtin_registry();
    design
        .define("m", "void main() { }\n", BTreeMap::new())
        .unwrap();
    let mut shader = Shader::new("#import main from 'm'\nvoid main() { }\n");
    let mut runtime = RuntimeRegistry::new();
    let err = shader.compile(&design, &mut runtime).unwrap_err();
    assert_eq!(err, SandboxError::ReservedFunction("main".into()));
}

#[test]
fn unknown_function_in_module_is_rejected() {
    let mut design = builtin_registry();
    design
        .define("m", EFFECT_MODULE, BTreeMap::new())
        .unwrap();
    let mut shader = Shader::new("#import missing from 'm'\nvoid main() { }\n");
    let mut runtime = RuntimeRegistry::new();
    let err = shader.compile(&design, &mut runtime).unwrap_err();
    assert_eq!(
        err,
        SandboxError::FunctionNotFound {
            module: "m".into(),
            function: "missing".into(),
        }
    );
}

#[test]
fn namespaced_uniforms_follow_the_prefix_shape() {
    let mut design = builtin_registry();
    design
        .define("m", EFFECT_MODULE, intensity_module_options())
        .unwrap();

    let mut shader = Shader::with_seed(
        "#import effect from 'm'\nvoid main() { vec3 v = effect(1.0); }\n",
        5,
    );
    let (_, runtime) = compile(&mut shader, &design);

    let uniform = &runtime.resolve_options("effect").unwrap()["intensity"].uniform;
    let rest = uniform.strip_prefix("effect_").expect("alias prefix");
    let (suffix, tail) = rest.split_at(6);
    assert!(suffix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    assert_eq!(tail, "_u_intensity");
}

#[test]
fn builtin_uniforms_stay_unprefixed_in_import_output() {
    let mut design = builtin_registry();
    design
        .define(
            "m",
            r"uniform float u_gain;

float sweep(vec2 uv) {
    return sin(u_time + uv.x * u_gain);
}
",
            BTreeMap::new(),
        )
        .unwrap();

    let mut shader = Shader::with_seed(
        "#import sweep from 'm'\nvoid main() { float s = sweep(vec2(0.0)); }\n",
        9,
    );
    let (compiled, _) = compile(&mut shader, &design);

    // The module's reference to u_time survives un-namespaced, and its
    // declaration appears exactly once.
    assert!(compiled.contains("sin(u_time"));
    assert_eq!(compiled.matches("uniform float u_time;").count(), 1);
    // The module's own uniform is namespaced at both ends.
    assert!(compiled.contains("_u_gain;"));
    assert!(compiled.contains("uv.x * sweep_"));
}

#[test]
fn recompile_draws_fresh_namespaces() {
    let design = builtin_registry();
    let source = "#import fbm from 'sandbox'\nvoid main() { float n = fbm(vec2(0.0)); }\n";
    let mut shader = Shader::with_seed(source, 21);
    let mut runtime = RuntimeRegistry::new();

    let first = shader.compile(&design, &mut runtime).unwrap().to_string();
    let again = shader.compile(&design, &mut runtime).unwrap().to_string();
    assert_eq!(first, again);

    runtime.clear();
    let recompiled = shader.recompile(&design, &mut runtime).unwrap();
    assert_ne!(first, recompiled);
}

#[test]
fn compiled_output_never_stacks_blank_lines() {
    let design = builtin_registry();
    let source = r"#import gradient from 'sandbox/colors'


#import fbm from 'sandbox'


void main() {
    vec3 c = gradient(fbm(vec2(0.5)), vec3(1.0), vec3(0.0));
}
";
    let mut shader = Shader::with_seed(source, 13);
    let (compiled, _) = compile(&mut shader, &design);
    assert!(!compiled.contains("\n\n\n"));
}

#[test]
fn gl2_sources_keep_their_version_directive() {
    let design = builtin_registry();
    let source = "#version 300 es\n#import fbm from 'sandbox'\nvoid main() { float n = fbm(vec2(0.0)); }\n";
    let mut shader = Shader::with_seed(source, 17);
    let (compiled, _) = compile(&mut shader, &design);

    assert!(compiled.starts_with("#version 300 es"));
    // Declarations land after the directive.
    let version_pos = compiled.find("#version").unwrap();
    let uniform_pos = compiled.find("uniform ").unwrap();
    assert!(uniform_pos > version_pos);
}
