//! Helpers for running the external probe tools.

use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus, Output};

use tracing::{debug, trace};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Failure to run an external program to completion.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("`{program}` not found in PATH")]
    NotFound { program: String },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl ProcessError {
    pub fn program(&self) -> &str {
        match self {
            Self::NotFound { program } | Self::Spawn { program, .. } | Self::Failed { program, .. } => {
                program
            }
        }
    }
}

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `std::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Run `program` with `args` and capture its output.
///
/// A missing executable and a non-zero exit status are reported as distinct
/// errors. Stdout is returned untouched on success.
pub fn run_capture<I, S>(program: &str, args: I) -> Result<Output, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = std_command(program);
    cmd.args(args);
    trace!(?cmd, "Spawning");

    let output = cmd.output().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ProcessError::NotFound {
                program: program.to_string(),
            }
        } else {
            ProcessError::Spawn {
                program: program.to_string(),
                source,
            }
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ProcessError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr,
        });
    }
    debug!(program, stdout_len = output.stdout.len(), "Process finished");
    Ok(output)
}
