//! Helper-program invocation.

use std::fmt;

use tokio::process::Command;
use tracing::debug;

use crate::error::DeviceError;

/// A program and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to run, resolved through `PATH`.
    pub program: String,
    /// Arguments, passed without a shell.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Build a command line.
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run to completion; a non-zero exit is an error carrying stderr.
    pub async fn run(&self) -> Result<(), DeviceError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DeviceError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if output.status.success() {
            debug!(program = %self.program, "device command succeeded");
            return Ok(());
        }
        Err(DeviceError::CommandFailed {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
