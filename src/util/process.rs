//! Subprocess execution utilities.
//!
//! External build tools are run through [`ProcessBuilder`]. Long-running
//! builds use [`ProcessBuilder::exec_streaming`], which forwards output line
//! by line while the process runs.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread;

use anyhow::{bail, Context, Result};

/// Capacity of the line channel shared by the pipe readers.
const LINE_QUEUE_DEPTH: usize = 256;

/// Which pipe a line of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Execute the command and capture its output.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.output()
            .with_context(|| format!("failed to execute `{}`", self.display_command()))
    }

    /// Execute and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Execute the command, handing every output line to `on_line` as soon as
    /// it is read.
    ///
    /// Each pipe gets its own reader thread feeding a bounded channel; the
    /// callback runs on the calling thread. Both readers are joined before
    /// the exit status is returned.
    pub fn exec_streaming<F>(&self, mut on_line: F) -> Result<ExitStatus>
    where
        F: FnMut(Stream, &str),
    {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.display_command()))?;

        let (tx, rx) = sync_channel::<(Stream, String)>(LINE_QUEUE_DEPTH);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        // The channel closes once both readers hit EOF.
        drop(tx);

        for (stream, line) in rx {
            on_line(stream, &line);
        }

        for reader in readers {
            if reader.join().is_err() {
                tracing::warn!("output reader for `{}` panicked", self.display_command());
            }
        }

        child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.display_command()))
    }

    /// Stream output through `tracing` and require success.
    pub fn run_logged(&self) -> Result<()> {
        let status = self.exec_streaming(|stream, line| match stream {
            Stream::Stdout => tracing::info!("{}", line),
            Stream::Stderr => tracing::warn!("{}", line),
        })?;
        if !status.success() {
            bail!(
                "`{}` failed with exit code {:?}",
                self.display_command(),
                status.code()
            );
        }
        Ok(())
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn spawn_reader<R>(pipe: R, stream: Stream, tx: SyncSender<(Stream, String)>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send((stream, line)).is_err() {
                break;
            }
        }
    })
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("cmake").args(["--build", ".", "--config", "Release"]);
        assert_eq!(pb.display_command(), "cmake --build . --config Release");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_streaming_collects_both_pipes() {
        let pb = ProcessBuilder::new("sh")
            .arg("-c")
            .arg("echo one; echo two 1>&2; echo three");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = pb
            .exec_streaming(|stream, line| match stream {
                Stream::Stdout => stdout.push(line.to_string()),
                Stream::Stderr => stderr.push(line.to_string()),
            })
            .unwrap();

        assert!(status.success());
        assert_eq!(stdout, vec!["one", "three"]);
        assert_eq!(stderr, vec!["two"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_logged_reports_failure() {
        let err = ProcessBuilder::new("sh")
            .arg("-c")
            .arg("exit 3")
            .run_logged()
            .unwrap_err();
        assert!(err.to_string().contains("exit code Some(3)"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_and_check_captures_output() {
        let output = ProcessBuilder::new("echo").arg("hello").exec_and_check().unwrap();
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }
}
