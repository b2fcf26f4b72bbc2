//! Shell-based step execution on the host.

use crate::runner::{StepContext, StepExecutor, StepOutcome};
use async_trait::async_trait;
use matrixci_core::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Executes a step's command with `<shell> -c <command>`.
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("sh")
    }
}

/// Upper bound on draining a step's output once its shell has exited.
const OUTPUT_DRAIN: Duration = Duration::from_secs(1);

/// Kills the step's process group, so commands started by the shell do not
/// outlive the step. Fires on drop if the step is abandoned.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                Ok(()) => debug!(pgid, "Killed step process group"),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "Failed to kill step process group"),
            }
        }

        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[async_trait]
impl StepExecutor for ShellExecutor {
    async fn execute(&self, ctx: &StepContext) -> Result<StepOutcome> {
        let start = std::time::Instant::now();
        let command = &ctx.step.run;

        info!(
            job = %ctx.job_name,
            step = %ctx.step.name,
            command = %command,
            workspace = %ctx.workspace.display(),
            "Executing shell command"
        );

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(&ctx.workspace)
            .envs(&ctx.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Internal(format!("Failed to spawn process: {}", e)))?;
        let mut group = ProcessGroup::new(&child);

        let stdout = child
            .stdout
            .take()
            .map(|out| forward_lines(out, "stdout", ctx));
        let stderr = child
            .stderr
            .take()
            .map(|err| forward_lines(err, "stderr", ctx));

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Internal(format!("Failed to wait for process: {}", e)))?;

        // Background jobs left by the shell would hold the output pipes open.
        group.kill();

        let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN;
        for mut handle in [stdout, stderr].into_iter().flatten() {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                debug!(job = %ctx.job_name, step = %ctx.step.name, "Output still open, detaching");
                handle.abort();
            }
        }

        let exit_code = status.code().unwrap_or(-1);
        let duration = start.elapsed();

        debug!(
            job = %ctx.job_name,
            step = %ctx.step.name,
            exit_code,
            duration_ms = duration.as_millis() as u64,
            "Command completed"
        );

        Ok(StepOutcome {
            exit_code,
            duration,
        })
    }
}

/// Relay each output line of a child stream into the log.
fn forward_lines<R>(reader: R, stream: &'static str, ctx: &StepContext) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let job = ctx.job_name.clone();
    let step = ctx.step.name.clone();

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "matrixci::output", job = %job, step = %step, stream, "{}", line);
        }
    })
}
