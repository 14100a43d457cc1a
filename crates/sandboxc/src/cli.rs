use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sandboxc",
    author,
    version,
    about = "Offline compiler for sandbox GLSL shaders",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every `#import` in a fragment shader and emit plain GLSL.
    Compile(CompileArgs),
    /// Parse a shader and report its imports, uniforms, and functions.
    Check(CheckArgs),
    /// Inspect the registered module library.
    Modules(ModulesCommand),
}

#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Fragment shader file to compile.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Extra module pack roots, searched in order.
    #[arg(long = "modules", value_name = "DIR")]
    pub module_roots: Vec<PathBuf>,

    /// Seed for the namespace suffixes, for reproducible output.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Write the compiled GLSL here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Fragment shader file to inspect.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ModulesCommand {
    #[command(subcommand)]
    pub action: ModulesAction,
}

#[derive(Subcommand, Debug)]
pub enum ModulesAction {
    /// List every registered module and its importable functions.
    List(ModulesListArgs),
    /// Show one module's functions, uniforms, and options.
    Show(ModulesShowArgs),
}

#[derive(Parser, Debug)]
pub struct ModulesListArgs {
    /// Extra module pack roots, searched in order.
    #[arg(long = "modules", value_name = "DIR")]
    pub module_roots: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ModulesShowArgs {
    /// Module name, e.g. `sandbox/colors`.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Extra module pack roots, searched in order.
    #[arg(long = "modules", value_name = "DIR")]
    pub module_roots: Vec<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_accepts_roots_and_seed() {
        let cli = Cli::try_parse_from([
            "sandboxc",
            "compile",
            "shader.frag",
            "--modules",
            "packs",
            "--modules",
            "more-packs",
            "--seed",
            "7",
        ])
        .unwrap();
        match cli.command {
            Command::Compile(args) => {
                assert_eq!(args.input, PathBuf::from("shader.frag"));
                assert_eq!(args.module_roots.len(), 2);
                assert_eq!(args.seed, Some(7));
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn modules_show_requires_a_name() {
        assert!(Cli::try_parse_from(["sandboxc", "modules", "show"]).is_err());
        let cli = Cli::try_parse_from(["sandboxc", "modules", "show", "sandbox/colors"]).unwrap();
        match cli.command {
            Command::Modules(ModulesCommand {
                action: ModulesAction::Show(args),
            }) => assert_eq!(args.name, "sandbox/colors"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
