//! The external model service, invoked as a subprocess.
//!
//! Both pipeline stages that talk to a model go through the narrow
//! [`ModelRunner`] capability trait: one call to list what is installed, one
//! call to run a model on a text payload. Tests substitute a deterministic
//! double; production uses [`OllamaRunner`], which shells out to the
//! `ollama` CLI with the payload on stdin.
//!
//! Calls are synchronous from the pipeline's point of view: the service is
//! GPU-bound and serialises requests internally, so there is nothing to gain
//! from issuing more than one at a time.

use crate::error::NotemillError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Narrow capability interface over the external model service.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    /// Identifiers of the models the service can run right now.
    async fn list_models(&self) -> Result<Vec<String>, NotemillError>;

    /// Run `model` with `input` on stdin; returns the service's stdout.
    async fn run(&self, model: &str, input: &str) -> Result<String, NotemillError>;
}

/// Production [`ModelRunner`] backed by the `ollama` CLI.
#[derive(Debug, Clone)]
pub struct OllamaRunner {
    /// Per-call timeout. `None` (the default) blocks until the process
    /// exits; expiry kills the child and surfaces as
    /// [`NotemillError::ModelInvocation`].
    timeout: Option<Duration>,
    program: &'static str,
}

impl Default for OllamaRunner {
    fn default() -> Self {
        Self {
            timeout: None,
            program: "ollama",
        }
    }
}

impl OllamaRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(secs: u64) -> Self {
        Self {
            timeout: Some(Duration::from_secs(secs)),
            ..Self::default()
        }
    }

    #[cfg(test)]
    fn with_program(program: &'static str) -> Self {
        Self {
            program,
            ..Self::default()
        }
    }

    /// Spawn the service and collect its stdout.
    ///
    /// `label` names the invocation in errors: the model id for `run`,
    /// `"ollama list"` for the listing call.
    async fn run_command(
        &self,
        label: &str,
        args: &[&str],
        input: Option<&str>,
    ) -> Result<String, NotemillError> {
        let invocation_err = |detail: String| NotemillError::ModelInvocation {
            model: label.to_string(),
            detail,
        };

        let mut command = Command::new(self.program);
        command
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // An abandoned child must not keep the GPU busy after a timeout.
            .kill_on_drop(true);

        debug!("Spawning: {} {}", self.program, args.join(" "));
        let mut child = command
            .spawn()
            .map_err(|e| invocation_err(format!("failed to spawn '{}': {e}", self.program)))?;

        // Feed stdin from its own task while the pipes below are drained: a
        // child that fills its stderr pipe before finishing reading stdin
        // must not deadlock the call. A failed write means the child closed
        // the pipe early; its captured stderr is the better diagnostic, so
        // the write error is only logged.
        if let Some(payload) = input {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| invocation_err("child stdin unavailable".into()))?;
            let payload = payload.to_owned();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    debug!("stdin write ended early: {e}");
                }
                // Dropping stdin closes the pipe so the model sees EOF.
            });
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| invocation_err(format!("timed out after {}s", limit.as_secs())))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| invocation_err(format!("failed to collect output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(invocation_err(format!(
                "exited with {}:\n{}",
                output.status, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ModelRunner for OllamaRunner {
    async fn list_models(&self) -> Result<Vec<String>, NotemillError> {
        let stdout = self.run_command("ollama list", &["list"], None).await?;
        Ok(parse_model_table(&stdout))
    }

    async fn run(&self, model: &str, input: &str) -> Result<String, NotemillError> {
        self.run_command(model, &["run", model], Some(input)).await
    }
}

/// Extract model identifiers from the tabular `ollama list` output.
///
/// The first whitespace-delimited token of each line is a model id; the
/// header tokens `NAME`, `MODEL`, and `----` are skipped.
pub fn parse_model_table(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|token| !matches!(*token, "NAME" | "MODEL" | "----"))
        .map(str::to_string)
        .collect()
}
