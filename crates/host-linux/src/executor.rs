use decom_core::{CommandError, CommandExecutor};
use std::process::Command;
use tracing::debug;

/// Runs cluster tools as child processes with a fixed extra environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    env: Vec<(String, String)>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute_with_output(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let command = render_command(program, args);
        debug!(command = %command, "running command");
        let output = Command::new(program)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|err| CommandError::new(&command, "", format!("failed to start: {}", err)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        // Success returns stdout alone so JSON output parses cleanly.
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout;
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let message = match output.status.code() {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        Err(CommandError::new(command, combined, message))
    }
}

pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}
