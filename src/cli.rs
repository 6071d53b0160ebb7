use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// labstep - run lab automation steps with strict error handling
#[derive(Parser, Debug)]
#[command(name = "labstep")]
#[command(about = "Run lab automation steps with capability fallback and strict error handling")]
#[command(version)]
pub struct Cli {
    /// Harness settings file (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable debug diagnostics (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve capabilities and print their load status as JSON
    Status {
        /// Capabilities to resolve (defaults to the settings' required list)
        names: Vec<String>,
    },
    /// Resolve a configuration path or literal and print it as JSON
    Config {
        /// Path to a JSON file, or an inline JSON literal
        input: String,
    },
    /// Run an external command as a step
    Run {
        /// Path to a JSON file, or an inline JSON literal
        #[arg(short, long, default_value = "{}")]
        config: String,
        /// Step name used in log lines
        name: String,
        /// Command and arguments to execute
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        let result = Cli::try_parse_from(["labstep"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_status_with_names() {
        let cli = Cli::try_parse_from(["labstep", "status", "logging", "all-core"]).unwrap();
        match cli.command {
            Commands::Status { names } => assert_eq!(names, vec!["logging", "all-core"]),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_global_settings() {
        let cli = Cli::try_parse_from([
            "labstep",
            "config",
            r#"{"a": 1}"#,
            "--settings",
            "/etc/labstep.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/labstep.json")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Config { .. }));
    }

    #[test]
    fn test_cli_run_collects_trailing_command() {
        let cli = Cli::try_parse_from([
            "labstep",
            "run",
            "--config",
            "lab.json",
            "install-tofu",
            "--",
            "tofu",
            "init",
            "-upgrade",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                config,
                name,
                command,
            } => {
                assert_eq!(config, "lab.json");
                assert_eq!(name, "install-tofu");
                assert_eq!(command, vec!["tofu", "init", "-upgrade"]);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_requires_command() {
        let result = Cli::try_parse_from(["labstep", "run", "install-tofu"]);
        assert!(result.is_err());
    }
}
