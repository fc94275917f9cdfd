//! Collaborators backed by external tools.
//!
//! Each tool is spawned through `process-utils`; a missing binary, a
//! non-zero exit and unparsable output all surface as
//! [`splice_engine::Error::CollaboratorUnavailable`].

mod ffprobe;
mod mediainfo;
mod tsp;

pub use ffprobe::Ffprobe;
pub use mediainfo::MediaInfoTool;
pub use tsp::Tsp;

use process_utils::{ProcessError, run_capture};

/// Run `program` and return its stdout as text.
fn run_tool<I, S>(program: &str, args: I) -> splice_engine::Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let output = run_capture(program, args).map_err(|e: ProcessError| {
        splice_engine::Error::collaborator(e.program(), e.to_string())
    })?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn invalid_output(tool: &str, reason: impl std::fmt::Display) -> splice_engine::Error {
    splice_engine::Error::collaborator(tool, format!("unexpected output: {reason}"))
}
