#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Stdio,
    time::Duration,
};

use anyhow::Context;
use tokio::{
    io::{AsyncRead, AsyncReadExt, BufReader},
    process::{Child, Command},
    task::AbortHandle,
    time::timeout,
};

/// Failure to obtain a finished subprocess.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// The program could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// program that failed to start
        program: String,
        /// underlying OS error
        #[source]
        source:  std::io::Error,
    },
    /// The deadline passed; the child has been killed.
    #[error("subprocess timed out after {0:?}")]
    TimedOut(Duration),
    /// Pipe or wait failure after a successful spawn.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Drop guard that terminates a spawned child process if callers forget to
/// await it, or when a deadline abandons the wait.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> anyhow::Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Aborts the pipe readers when the wait is abandoned. A grandchild that
/// inherited the pipes would otherwise keep them being drained forever.
struct ReaderAbortGuard(Vec<AbortHandle>);

impl Drop for ReaderAbortGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status:    std::process::ExitStatus,
    /// Contents written to stdout, capped at the requested limit.
    pub stdout:    Vec<u8>,
    /// Contents written to stderr, capped at the requested limit.
    pub stderr:    Vec<u8>,
    /// True if either stream was cut at the limit.
    pub truncated: bool,
}

impl Collected {
    /// stderr followed by stdout, decoded lossily.
    pub fn combined_output(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stdout));
        text
    }
}

/// Reads at most `limit` bytes, then drains the rest so the child never
/// blocks on a full pipe.
async fn read_capped<R>(stream: R, limit: usize) -> anyhow::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    (&mut reader)
        .take(limit as u64)
        .read_to_end(&mut buf)
        .await
        .context("failed to read child output")?;
    let dropped = tokio::io::copy(&mut reader, &mut tokio::io::sink())
        .await
        .context("failed to drain child output")?;
    Ok((buf, dropped > 0))
}

/// Spawns a command with a null stdin and collects stdout/stderr.
///
/// * `cwd`: working directory for the child, if any.
/// * `deadline`: wall-clock bound; on expiry the child is killed.
/// * `output_limit`: per-stream cap on captured bytes.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    cwd: Option<&Path>,
    deadline: Option<Duration>,
    output_limit: usize,
) -> Result<Collected, ProcessError> {
    let program = program.as_ref();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string_lossy().into_owned(),
        source,
    })?;
    let mut guard = ChildDropGuard::new(child);

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_task = tokio::spawn(read_capped(stdout, output_limit));
    let err_task = tokio::spawn(read_capped(stderr, output_limit));
    let _readers = ReaderAbortGuard(vec![out_task.abort_handle(), err_task.abort_handle()]);

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let (stdout, out_cut) = out_task.await.context("stdout task join error")??;
        let (stderr, err_cut) = err_task.await.context("stderr task join error")??;
        guard.disarm();
        Ok::<Collected, anyhow::Error>(Collected {
            status,
            stdout,
            stderr,
            truncated: out_cut || err_cut,
        })
    };

    match deadline {
        Some(limit) => match timeout(limit, wait_future).await {
            Ok(collected) => Ok(collected?),
            Err(_) => Err(ProcessError::TimedOut(limit)),
        },
        None => Ok(wait_future.await?),
    }
}
