//! Long-lived exiftool session.
//!
//! exiftool is started once with `-stay_open True -@ -` and then fed argument
//! lists over stdin. Each command ends with `-executeN`; exiftool answers with
//! `{readyN}` on stdout, and `-echo4 {readyN}` marks the end of its stderr
//! output for the same command. stderr is drained on its own thread so a
//! chatty command cannot fill the pipe while stdout is being read.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::ToolError;

/// Output of one metadata tool command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A command/response metadata tool. One instance serves one worker.
pub trait MetadataTool {
    fn execute(&mut self, args: &[String]) -> Result<ToolOutput, ToolError>;
}

/// A running `exiftool -stay_open` process. Closed on drop.
pub struct ExifToolSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: Receiver<io::Result<String>>,
    stderr_thread: Option<JoinHandle<()>>,
    sequence: u32,
}

impl ExifToolSession {
    pub fn start(program: &Path) -> Result<Self, ToolError> {
        let mut command = Command::new(program);
        command.args(["-stay_open", "True", "-@", "-"]);
        Self::spawn(command)
    }

    fn spawn(mut command: Command) -> Result<Self, ToolError> {
        let spawned = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = spawned.map_err(|source| ToolError::Spawn {
            program: command.get_program().to_string_lossy().into_owned(),
            source,
        })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Closed);
        };

        let (stderr, stderr_thread) = match drain_lines(stderr, child.id()) {
            Ok(drain) => drain,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        debug!("Started exiftool session (pid {})", child.id());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
            stderr_thread: Some(stderr_thread),
            sequence: 0,
        })
    }

    /// Reports whether `program` can be started at all.
    pub fn is_available(program: &Path) -> bool {
        Command::new(program)
            .arg("-ver")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn close(&mut self) -> Result<(), ToolError> {
        self.stdin.write_all(b"-stay_open\nFalse\n")?;
        self.stdin.flush()?;
        self.child.wait()?;
        Ok(())
    }
}

/// Forwards every line of `source` to a channel from a dedicated thread.
/// The channel disconnects when the pipe reaches end of file.
fn drain_lines<R>(
    source: R,
    pid: u32,
) -> io::Result<(Receiver<io::Result<String>>, JoinHandle<()>)>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let handle = thread::Builder::new()
        .name(format!("exiftool-stderr-{pid}"))
        .spawn(move || {
            for line in BufReader::new(source).lines() {
                if sender.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok((receiver, handle))
}

impl MetadataTool for ExifToolSession {
    fn execute(&mut self, args: &[String]) -> Result<ToolOutput, ToolError> {
        self.sequence += 1;
        let marker = format!("{{ready{}}}", self.sequence);

        let mut command = String::new();
        for arg in args {
            // Arguments are line-delimited; a newline would split one in two.
            command.push_str(&arg.replace('\n', " "));
            command.push('\n');
        }
        command.push_str(&format!("-echo4\n{marker}\n-execute{}\n", self.sequence));

        self.stdin.write_all(command.as_bytes())?;
        self.stdin.flush()?;

        let stdout = read_until_marker((&mut self.stdout).lines(), &marker)?;
        let stderr = read_until_marker(self.stderr.iter(), &marker)?;

        Ok(ToolOutput { stdout, stderr })
    }
}

impl Drop for ExifToolSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close exiftool session cleanly: {}", e);
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

fn read_until_marker<I>(lines: I, marker: &str) -> Result<String, ToolError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut output = String::new();

    for line in lines {
        let line = line?;
        let trimmed = line.trim_end_matches('\r');
        if let Some(rest) = trimmed.strip_suffix(marker) {
            // exiftool does not always end its output with a newline.
            output.push_str(rest);
            return Ok(output.trim_end().to_string());
        }
        output.push_str(trimmed);
        output.push('\n');
    }

    Err(ToolError::Closed)
}

/// Default exiftool program name, resolved through `PATH`.
pub fn default_program() -> PathBuf {
    PathBuf::from("exiftool")
}
