use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn sandboxc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sandboxc"))
        .args(args)
        .output()
        .expect("failed to run sandboxc")
}

fn write_shader(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("shader.frag");
    fs::write(
        &path,
        r"#import gradient from 'sandbox/colors'

void main() {
    vec3 c = gradient(0.5, vec3(1.0), vec3(0.0));
}
",
    )
    .unwrap();
    path
}

#[test]
fn compile_emits_plain_glsl() {
    let temp = TempDir::new().unwrap();
    let shader = write_shader(temp.path());

    let output = sandboxc(&["compile", shader.to_str().unwrap(), "--seed", "42"]);
    assert!(output.status.success());

    let compiled = String::from_utf8(output.stdout).unwrap();
    assert!(!compiled.contains("#import"));
    assert!(compiled.contains("vec3 gradient("));
    assert!(compiled.contains("uniform vec2 u_resolution;"));
    assert!(compiled.contains("uniform vec3 gradient_"));
}

#[test]
fn compile_with_a_seed_is_reproducible() {
    let temp = TempDir::new().unwrap();
    let shader = write_shader(temp.path());
    let path = shader.to_str().unwrap();

    let first = sandboxc(&["compile", path, "--seed", "7"]);
    let second = sandboxc(&["compile", path, "--seed", "7"]);
    assert_eq!(first.stdout, second.stdout);

    let other_seed = sandboxc(&["compile", path, "--seed", "8"]);
    assert_ne!(first.stdout, other_seed.stdout);
}

#[test]
fn compile_resolves_module_packs_from_roots() {
    let temp = TempDir::new().unwrap();
    let packs = temp.path().join("packs");
    let pack_dir = packs.join("fx");
    fs::create_dir_all(&pack_dir).unwrap();
    fs::write(
        pack_dir.join("module.toml"),
        "name = \"fx\"\nsource = \"fx.glsl\"\n",
    )
    .unwrap();
    fs::write(
        pack_dir.join("fx.glsl"),
        "float lift(float x) {\n    return x + 1.0;\n}\n",
    )
    .unwrap();

    let shader = temp.path().join("shader.frag");
    fs::write(
        &shader,
        "#import lift from 'fx'\n\nvoid main() {\n    float l = lift(0.0);\n}\n",
    )
    .unwrap();

    let output = sandboxc(&[
        "compile",
        shader.to_str().unwrap(),
        "--modules",
        packs.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");
    let compiled = String::from_utf8(output.stdout).unwrap();
    assert!(compiled.contains("float lift("));
}

#[test]
fn compile_writes_output_files() {
    let temp = TempDir::new().unwrap();
    let shader = write_shader(temp.path());
    let out = temp.path().join("compiled.frag");

    let output = sandboxc(&[
        "compile",
        shader.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let compiled = fs::read_to_string(&out).unwrap();
    assert!(compiled.contains("void main()"));
}

#[test]
fn faults_exit_nonzero_with_their_code() {
    let temp = TempDir::new().unwrap();
    let shader = temp.path().join("bad.frag");
    fs::write(&shader, "#import x from 'nowhere'\nvoid main() { }\n").unwrap();

    let output = sandboxc(&["compile", shader.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("MODULE_ERROR"), "{stderr}");
    assert!(stderr.contains("nowhere"), "{stderr}");
}

#[test]
fn import_syntax_faults_name_the_line() {
    let temp = TempDir::new().unwrap();
    let shader = temp.path().join("bad.frag");
    fs::write(&shader, "@import x from 'm'\nvoid main() { }\n").unwrap();

    let output = sandboxc(&["compile", shader.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("SHADER_ERROR"), "{stderr}");
    assert!(stderr.contains("Invalid prefix '@'"), "{stderr}");
}

#[test]
fn check_reports_the_shader_shape() {
    let temp = TempDir::new().unwrap();
    let shader = write_shader(temp.path());

    let output = sandboxc(&["check", shader.to_str().unwrap()]);
    assert!(output.status.success());
    let report = String::from_utf8(output.stdout).unwrap();
    assert!(report.contains("gradient"));
    assert!(report.contains("sandbox/colors"));
    assert!(report.contains("void main"));
}

#[test]
fn modules_list_includes_the_bundled_library() {
    let output = sandboxc(&["modules", "list"]);
    assert!(output.status.success());
    let listing = String::from_utf8(output.stdout).unwrap();
    assert!(listing.contains("sandbox/colors"));
    assert!(listing.contains("gradient"));
    assert!(listing.contains("sandbox/filters"));
}

#[test]
fn modules_show_prints_options() {
    let output = sandboxc(&["modules", "show", "sandbox/filters"]);
    assert!(output.status.success());
    let detail = String::from_utf8(output.stdout).unwrap();
    assert!(detail.contains("blur"));
    assert!(detail.contains("u_radius"));
}
