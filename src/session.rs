//! Shell execution: the persistent per-file session and one-shot captures.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

/// Printed by the session shell after every command to delimit its output.
const MARKER: &str = "__shtest_sync__";

/// Errors from the persistent session. All are fatal to the run.
#[derive(Debug)]
pub enum SessionError {
    /// Could not spawn or talk to the shell.
    Io(io::Error),
    /// The shell exited while a test was in flight (e.g. a test ran `exit`).
    Terminated,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "shell session I/O failed: {e}"),
            SessionError::Terminated => write!(f, "shell session terminated unexpectedly"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io(e) => Some(e),
            SessionError::Terminated => None,
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::Io(e)
    }
}

/// A long-lived `sh` whose state persists across [`ShellSession::run`] calls.
///
/// Each command is written to a scratch file and sourced with `.` so that
/// variable, function, alias, and working-directory changes stay in the
/// session. The redirection applied to the `.` command collects combined
/// stdout+stderr in a capture file byte-for-byte, including a missing final
/// newline; a marker echoed afterwards tells us the command finished.
pub struct ShellSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    cmd_path: PathBuf,
    out_path: PathBuf,
}

impl ShellSession {
    /// Spawn a session in `workdir`, keeping scratch files under `scratch`.
    pub fn spawn(workdir: &Path, scratch: &Path) -> Result<Self, SessionError> {
        let mut child = Command::new("sh")
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SessionError::Terminated);
        };
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            cmd_path: scratch.join("cmd"),
            out_path: scratch.join("out"),
        })
    }

    /// Run one command and return its combined stdout+stderr.
    ///
    /// Exit status is deliberately not collected; matchers work on text only.
    pub fn run(&mut self, command: &str) -> Result<String, SessionError> {
        fs::write(&self.cmd_path, format!("{command}\n"))?;
        // Stdin comes from /dev/null so a command that reads input cannot
        // swallow the control stream.
        writeln!(
            self.stdin,
            ". '{}' < /dev/null > '{}' 2>&1",
            self.cmd_path.display(),
            self.out_path.display()
        )?;
        writeln!(self.stdin, "echo {MARKER}")?;
        self.stdin.flush()?;

        // The session's own stdout carries nothing but markers; command
        // output goes to the capture file.
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(SessionError::Terminated);
            }
            if line.trim_end() == MARKER {
                break;
            }
        }

        let bytes = fs::read(&self.out_path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        // Reap the shell to avoid zombies.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Capture the stdout of `sh -c command` in a fresh subshell; stderr passes
/// through. Used for eval-mode expected output.
pub fn capture(command: &str) -> io::Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a pre/post-flight hook with inherited stdio and report its status.
pub fn run_hook(command: &str) -> io::Result<ExitStatus> {
    Command::new("sh").arg("-c").arg(command).status()
}
