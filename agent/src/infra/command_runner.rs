//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` spawns the validated program directly with its
//! argument vector. No shell is involved, so nothing in the arguments is
//! re-interpreted.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::application::ports::CommandRunner;
use crate::domain::{ExecError, Invocation};

/// Production `CommandRunner`.
///
/// `tokio::time::timeout` around `.output().await` would only drop the
/// future. This implementation races completion against the deadline with
/// `tokio::select!` and calls `child.kill()` explicitly, so a timed-out
/// process is gone before `run` returns.
#[derive(Debug, Default)]
pub struct TokioCommandRunner {
    working_dir: Option<PathBuf>,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every process with `dir` as its current directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        limit: Option<Duration>,
    ) -> Result<Output, ExecError> {
        let program = invocation.program();
        let mut command = tokio::process::Command::new(program);
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();
        debug!(%program, ?pid, "spawned process");

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        let deadline = async {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                let status = status.map_err(|source| ExecError::Wait {
                    program: program.to_string(),
                    source,
                })?;
                Ok::<_, ExecError>(Output { status, stdout, stderr })
            } => result,
            () = deadline => {
                let _ = child.kill().await;
                Err(ExecError::TimedOut {
                    program: program.to_string(),
                    limit: limit.unwrap_or_default(),
                    pid,
                })
            }
        }
    }
}
