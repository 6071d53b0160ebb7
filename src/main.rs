//! labstep - Main entry point
//!
//! Thin front end over the library: builds the capability registry from the
//! harness settings and dispatches to the requested command.

use std::io::Write;
use std::process::ExitCode;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use labstep::cli::{Cli, Commands};
use labstep::command_step::run_command;
use labstep::{
    ConfigInput, HarnessSettings, ImportManager, LabError, StepRunner, builtin_manager,
};

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli);

    match run(cli) {
        Ok(code) => code,
        // The step runner already wrote the one failure line
        Err(e) if e.is_step_failure() => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, LabError> {
    let settings = HarnessSettings::resolve(cli.settings.as_deref())?;
    let manager = builtin_manager(&settings)?;

    match cli.command {
        Commands::Status { names } => {
            let names = if names.is_empty() {
                settings.required_capabilities.clone()
            } else {
                names
            };
            print_status(&manager, &names)
        }
        Commands::Config { input } => {
            let input = ConfigInput::classify(&input);
            info!("Resolving configuration from {}", input);
            let config = input.resolve(settings.literal_policy)?;
            println!("{}", serde_json::to_string_pretty(&config.to_json())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            config,
            name,
            command,
        } => {
            let input = ConfigInput::classify(&config);
            let runner = StepRunner::new(&manager).with_literal_policy(settings.literal_policy);
            runner.run_step(&name, &input, |config, _scope| {
                let output = run_command(&command, config)?;
                let mut stdout = std::io::stdout();
                stdout.write_all(output.stdout.as_bytes())?;
                stdout.flush()?;
                output.ensure_success(&name)
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_status(manager: &ImportManager, names: &[String]) -> Result<ExitCode, LabError> {
    let (report, code) = match manager.resolve_all(names) {
        Ok(report) => (report, ExitCode::SUCCESS),
        Err(LabError::NoCapabilityUsable { report }) => (report, ExitCode::FAILURE),
        Err(e) => return Err(e),
    };
    let body = serde_json::json!({
        "platform": labstep::Platform::current(),
        "capabilities": report.capabilities,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(code)
}
