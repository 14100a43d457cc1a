mod cli;
mod run;

use std::process::ExitCode;

use cli::{Command, ModulesAction};
use preprocessor::SandboxError;

fn main() -> ExitCode {
    let cli = cli::parse();
    run::initialise_tracing();

    let result = match cli.command {
        Command::Compile(args) => run::run_compile(args),
        Command::Check(args) => run::run_check(args),
        Command::Modules(modules) => match modules.action {
            ModulesAction::List(args) => run::run_modules_list(args),
            ModulesAction::Show(args) => run::run_modules_show(args),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Faults from the sandbox core carry a stable code; lead with it
            // so scripted callers can branch without string matching.
            match err.downcast_ref::<SandboxError>() {
                Some(fault) => eprintln!("{}: {err:#}", fault.code()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
