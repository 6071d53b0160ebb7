//! External commands as step bodies.
//!
//! `labstep run` wraps an arbitrary program in a step. The step's
//! configuration is exported to the child as JSON in `LABSTEP_CONFIG`, and a
//! non-zero exit is turned into the step body's error.

use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};
use tracing::info;

use crate::config_input::ConfigObject;

/// Environment variable carrying the step configuration as JSON
pub const CONFIG_ENV: &str = "LABSTEP_CONFIG";

/// What a step's child process left behind.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub program: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a failed child into the error of the step `step`.
    ///
    /// The child's trimmed stderr is appended when it wrote any.
    pub fn ensure_success(&self, step: &str) -> Result<()> {
        let how = match self.exit_code {
            Some(0) => return Ok(()),
            Some(code) => format!("exited with code {}", code),
            None => "was killed by a signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            bail!("step '{}': {} {}", step, self.program, how)
        } else {
            bail!("step '{}': {} {}: {}", step, self.program, how, stderr)
        }
    }
}

/// Run `argv` to completion with the step configuration in its environment.
///
/// Only a failure to start or wait on the process is an error here; a
/// non-zero exit is reported through [`CommandOutput::success`].
pub fn run_command(argv: &[String], config: &ConfigObject) -> Result<CommandOutput> {
    let Some((program, args)) = argv.split_first() else {
        bail!("no command given");
    };

    info!("run_command: {} args={:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .env(CONFIG_ENV, config.to_json().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("Failed to spawn command: {}", program))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code();

    if output.status.success() {
        info!("Command {} executed successfully", program);
    } else {
        info!("Command {} failed with exit code {}", program, exit_code.unwrap_or(-1));
    }

    Ok(CommandOutput {
        program: program.clone(),
        stdout,
        stderr,
        exit_code,
    })
}
