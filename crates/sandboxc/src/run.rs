use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use modpack::ModuleRepository;
use preprocessor::{ModuleRegistry, Parser, RuntimeRegistry, Shader};

use crate::cli::{CheckArgs, CompileArgs, ModulesListArgs, ModulesShowArgs};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// The bundled library plus any module packs found under `roots`.
fn build_registry(roots: &[PathBuf]) -> Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::with_builtins()?;
    if !roots.is_empty() {
        let repository = ModuleRepository::new(roots.to_vec());
        let installed = repository.install(&mut registry)?;
        debug!(installed, roots = ?repository.search_roots(), "installed module packs");
    }
    Ok(registry)
}

pub fn run_compile(args: CompileArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read shader '{}'", args.input.display()))?;
    let design = build_registry(&args.module_roots)?;

    let mut shader = match args.seed {
        Some(seed) => Shader::with_seed(source, seed),
        None => Shader::new(source),
    };
    let mut runtime = RuntimeRegistry::new();
    let compiled = shader.compile(&design, &mut runtime)?.to_string();

    for (key, set) in runtime.all_options() {
        for (option, entry) in set {
            debug!(key, option = %option, uniform = %entry.uniform, "option mapping");
        }
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &compiled)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            info!(output = %path.display(), "wrote compiled shader");
        }
        None => print!("{compiled}"),
    }
    Ok(())
}

pub fn run_check(args: CheckArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read shader '{}'", args.input.display()))?;
    let mut parser = Parser::new(source);
    let version = parser.version();
    let parsed = parser.parse()?;

    println!("{}: {version}", args.input.display());

    if parsed.imports.is_empty() {
        println!("imports: none");
    } else {
        println!("imports:");
        for import in &parsed.imports {
            if import.alias == import.name {
                println!(
                    "  {:<20} from {:<20} line {}",
                    import.name, import.module, import.line
                );
            } else {
                println!(
                    "  {:<20} from {:<20} line {} (as {})",
                    import.name, import.module, import.line, import.alias
                );
            }
        }
    }

    if parsed.uniforms.is_empty() {
        println!("uniforms: none");
    } else {
        println!("uniforms:");
        for uniform in &parsed.uniforms {
            println!("  {:<28} line {}", uniform.declaration(), uniform.line);
        }
    }

    if parsed.functions.is_empty() {
        println!("functions: none");
    } else {
        println!("functions:");
        for function in &parsed.functions {
            println!(
                "  {} {}({} params, {} refs)  line {}",
                function.return_type,
                function.name,
                function.params.len(),
                function.deps.len(),
                function.line
            );
        }
    }
    Ok(())
}

pub fn run_modules_list(args: ModulesListArgs) -> Result<()> {
    let registry = build_registry(&args.module_roots)?;
    let definitions = registry.available();
    if definitions.is_empty() {
        println!("No modules registered.");
        return Ok(());
    }

    println!("Registered modules:");
    for definition in definitions {
        let methods = definition.methods.join(", ");
        println!("  {:<20} {methods}", definition.name);
    }
    Ok(())
}

pub fn run_modules_show(args: ModulesShowArgs) -> Result<()> {
    let registry = build_registry(&args.module_roots)?;
    let module = registry.resolve(&args.name)?;
    let definition = module.definition(&registry)?;

    println!("module: {}", definition.name);
    println!("functions:");
    for method in &definition.methods {
        println!("  {method}");
    }

    if definition.uniforms.is_empty() {
        println!("uniforms: none");
    } else {
        println!("uniforms:");
        for uniform in &definition.uniforms {
            println!("  {}", uniform.declaration());
        }
    }

    if definition.options.is_empty() {
        println!("options: none");
    } else {
        println!("options:");
        for (function, set) in &definition.options {
            for (option, entry) in set {
                println!("  {function}.{option:<16} -> {}", entry.uniform);
            }
        }
    }
    Ok(())
}
