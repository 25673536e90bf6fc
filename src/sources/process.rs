// src/sources/process.rs

//! Spawning package-manager commands
//!
//! Adapters talk to their package manager through its CLI. Listing runs
//! stream stdout line by line so large package sets are never buffered
//! whole; short administrative runs capture their output.

use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Lines};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Map a spawn failure: a missing executable means the source is
/// unavailable on this host, anything else is a real I/O error
fn spawn_error(source: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::SourceUnavailable(source.to_string())
    } else {
        Error::Io(e)
    }
}

/// Whether `command` can be executed on this host
pub(crate) fn probe(command: &str) -> bool {
    Command::new(command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run a command to completion and return its stdout
pub(crate) fn run(source: &str, command: &mut Command) -> Result<String> {
    let output = command
        .output()
        .map_err(|e| spawn_error(source, e))?;

    if !output.status.success() {
        let rendered = std::iter::once(command.get_program())
            .chain(command.get_args())
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        return Err(Error::Command {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Lazily yields the stdout lines of a spawned command
///
/// The child runs concurrently with consumption; dropping the iterator
/// reaps it. The sequence is finite and cannot be restarted.
#[derive(Debug)]
pub(crate) struct CommandLines {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl CommandLines {
    /// Spawn `command` with piped stdout
    pub(crate) fn spawn(source: &str, mut command: Command) -> Result<Self> {
        command.stdout(Stdio::piped());

        let mut child = command.spawn().map_err(|e| spawn_error(source, e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::SourceUnavailable(source.to_string()))?;

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

impl Iterator for CommandLines {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

impl Drop for CommandLines {
    fn drop(&mut self) {
        // The consumer may stop early; kill before waiting so a child
        // blocked on a full pipe cannot stall us.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
