//! Short-lived helper processes with a hard time limit.
//!
//! The desktop traits are synchronous (they run on plain threads or inside
//! `spawn_blocking`), so [`run_bounded`] drives a private current-thread Tokio
//! runtime for the lifetime of one child.  A child that outlives its budget is
//! killed and reaped before the call returns.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Why a helper process did not produce an [`Output`].
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("lost track of {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("could not start process runtime: {0}")]
    Runtime(#[source] io::Error),
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Run `program args...` to completion, or kill it after `timeout`.
///
/// Any exit status is returned as-is; interpreting it is up to the caller.
/// Blocking: never call this from inside an async task.
///
/// # Errors
///
/// [`ProcessError::Spawn`] if the program cannot be started and
/// [`ProcessError::TimedOut`] if it was killed for running too long.
pub fn run_bounded(program: &str, args: &[String], timeout: Duration) -> Result<Output, ProcessError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ProcessError::Runtime)?;

    runtime.block_on(async {
        debug!(program, ?args, ?timeout, "running helper process");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::time::timeout(timeout, async {
            let (status, stdout, stderr) = tokio::join!(child.wait(), drain(stdout), drain(stderr));
            Ok::<_, io::Error>(Output {
                status: status?,
                stdout: stdout?,
                stderr: stderr?,
            })
        })
        .await;

        match finished {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(ProcessError::Wait {
                program: program.to_string(),
                source,
            }),
            Err(_) => {
                warn!(program, ?timeout, "helper process timed out; killing it");
                if let Err(e) = child.kill().await {
                    warn!(program, error = %e, "failed to kill timed-out process");
                }
                Err(ProcessError::TimedOut {
                    program: program.to_string(),
                    timeout,
                })
            }
        }
    })
}
