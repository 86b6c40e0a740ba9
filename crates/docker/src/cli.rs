//! [`ContainerRuntime`] implementation over the `docker` binary.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use quarry_core::DockerConfig;

use crate::error::{daemon_unreachable, resource_exhausted, BuildError, RuntimeError};
use crate::runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, ImageRef};

/// Container runtime backed by the docker command line.
pub struct DockerCli {
    config: DockerConfig,
}

impl DockerCli {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Run one docker invocation, returning trimmed stdout on success.
    async fn run(
        &self,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, RuntimeError> {
        let mut cmd = Command::new("docker");
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout {
            Some(t) => tokio::time::timeout(t, cmd.output())
                .await
                .map_err(|_| RuntimeError::CommandFailed {
                    stderr: format!("docker {} timed out", args.first().unwrap_or(&"")),
                })??,
            None => cmd.output().await?,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if daemon_unreachable(&stderr) {
                Err(RuntimeError::DaemonUnreachable(stderr))
            } else {
                Err(RuntimeError::CommandFailed { stderr })
            }
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build_image(&self, context: &Path, tag: &str) -> Result<ImageRef, BuildError> {
        let start = Instant::now();
        let context_arg = context.to_string_lossy();

        tracing::info!(
            context = %context_arg,
            tag,
            "Building docker image (this is likely to take a while)"
        );

        let mut cmd = Command::new("docker");
        cmd.args(["build", "--quiet", "--tag", tag, &context_arg])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.build_timeout, cmd.output())
            .await
            .map_err(|_| BuildError::BuildTimeout {
                elapsed_secs: start.elapsed().as_secs(),
            })?
            .map_err(|e| BuildError::ContextError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_build_failure(stderr));
        }

        // `--quiet` prints only the image id.
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!(
            tag,
            id = %id,
            elapsed_secs = start.elapsed().as_secs(),
            "Docker image built"
        );
        Ok(ImageRef {
            id,
            tag: tag.to_string(),
        })
    }

    async fn tag_image(&self, image: &ImageRef, tag: &str) -> Result<(), BuildError> {
        self.run(&["tag", &image.id, tag], None)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                RuntimeError::DaemonUnreachable(s) => BuildError::RuntimeUnreachable(s),
                RuntimeError::CommandFailed { stderr } => BuildError::ContextError(stderr),
                RuntimeError::Io(e) => BuildError::ContextError(e.to_string()),
            })
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        let mut args: Vec<String> = vec!["create".into(), "--name".into(), spec.name.clone()];
        for mount in &spec.mounts {
            args.push("--volume".into());
            args.push(mount.to_bind_arg());
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.run(&arg_refs, None).await?;
        tracing::debug!(container = %id, name = %spec.name, "Created container");
        Ok(ContainerHandle { id })
    }

    async fn start(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.run(&["start", &container.id], None).await?;
        Ok(())
    }

    async fn attach(
        &self,
        container: &ContainerHandle,
        observer: mpsc::Sender<String>,
    ) -> Result<i64, RuntimeError> {
        // Follow the combined output stream. `--follow` exits on its own
        // once the container does.
        let mut logs = Command::new("docker")
            .args(["logs", "--follow", &container.id])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = logs.stdout.take();
        let stderr = logs.stderr.take();
        let out_task = tokio::spawn(forward_lines(stdout, observer.clone()));
        let err_task = tokio::spawn(forward_lines(stderr, observer));

        // `docker wait` blocks until the container exits and prints the
        // exit code.
        let code_text = self.run(&["wait", &container.id], None).await?;
        let exit_code =
            code_text
                .parse::<i64>()
                .map_err(|_| RuntimeError::CommandFailed {
                    stderr: format!("unparseable exit code from docker wait: '{code_text}'"),
                })?;

        // Drain the remaining log output before returning.
        let _ = logs.wait().await;
        let _ = out_task.await;
        let _ = err_task.await;

        Ok(exit_code)
    }

    async fn stop(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        let grace = self.config.stop_timeout.as_secs().to_string();
        self.run(&["stop", "--time", &grace, &container.id], None)
            .await?;
        Ok(())
    }

    async fn remove(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.run(&["rm", &container.id], None).await?;
        Ok(())
    }
}

/// Forward a child output stream to the observer channel line-by-line.
///
/// Stops early if the observer hangs up; the run itself is unaffected.
async fn forward_lines<R: AsyncRead + Unpin>(handle: Option<R>, tx: mpsc::Sender<String>) {
    if let Some(r) = handle {
        let mut lines = BufReader::new(r).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    }
}

/// Map a failed `docker build` stderr to the build error taxonomy.
fn classify_build_failure(stderr: String) -> BuildError {
    if daemon_unreachable(&stderr) {
        BuildError::RuntimeUnreachable(stderr)
    } else if resource_exhausted(&stderr) {
        BuildError::ResourceExhausted(stderr)
    } else {
        BuildError::ContextError(stderr)
    }
}
