//! Active-tab URL lookup for browser applications.
//!
//! [`TabResolver`] classifies an application identifier (see
//! [`crate::browser`]) and, for known browsers, runs a query script through a
//! [`ScriptRunner`]. Every failure is absorbed: the caller only ever sees
//! `Some(url)` or `None`.

use std::{io, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{io::AsyncReadExt, process::Command, time};
use tracing::{debug, trace};

use crate::{browser, config::ResolverCfg};

/// Failure modes of a script run. Never surfaced past [`TabResolver`].
#[derive(Debug, Error)]
pub enum RunError {
    /// The interpreter could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Interpreter that failed to start.
        program: String,
        /// Underlying spawn error.
        source: io::Error,
    },
    /// The script did not finish within the timeout.
    #[error("script timed out after {0:?}")]
    Timeout(Duration),
    /// The script exited unsuccessfully.
    #[error("script exited with {0}")]
    ExitStatus(String),
    /// The script wrote more than the allowed output.
    #[error("script output exceeded {0} bytes")]
    Overflow(usize),
    /// Reading output or waiting on the child failed.
    #[error("script I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Executes a query script and returns its standard output.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run `script` to completion and return its stdout as text.
    async fn run(&self, script: &str) -> Result<String, RunError>;
}

/// Script runner that invokes an interpreter subprocess (`osascript -e <script>`).
///
/// Output is read up to `max_output` bytes; the whole run, including process
/// exit, is bounded by `timeout`. The child is killed if the run is abandoned.
#[derive(Debug, Clone)]
pub struct OsaScript {
    /// Interpreter executable.
    program: String,
    /// Flag placed before the inline script.
    script_flag: String,
    /// Hard bound on a single run.
    timeout: Duration,
    /// Maximum accepted stdout size.
    max_output: usize,
}

impl OsaScript {
    /// Runner for `program flag script` with the given limits.
    pub fn new(
        program: impl Into<String>,
        script_flag: impl Into<String>,
        timeout: Duration,
        max_output: usize,
    ) -> Self {
        Self {
            program: program.into(),
            script_flag: script_flag.into(),
            timeout,
            max_output,
        }
    }

    /// Runner built from resolver configuration.
    pub fn from_cfg(cfg: &ResolverCfg) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.script_flag.clone(),
            cfg.timeout(),
            cfg.max_output_bytes,
        )
    }
}

impl Default for OsaScript {
    fn default() -> Self {
        Self::from_cfg(&ResolverCfg::default())
    }
}

#[async_trait]
impl ScriptRunner for OsaScript {
    async fn run(&self, script: &str) -> Result<String, RunError> {
        let mut child = Command::new(&self.program)
            .arg(&self.script_flag)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout not captured"))?;

        let limit = self.max_output;
        let work = async {
            let mut buf = Vec::new();
            (&mut stdout)
                .take(limit as u64 + 1)
                .read_to_end(&mut buf)
                .await?;
            if buf.len() > limit {
                return Err(RunError::Overflow(limit));
            }
            let status = child.wait().await?;
            if !status.success() {
                return Err(RunError::ExitStatus(status.to_string()));
            }
            Ok::<_, RunError>(String::from_utf8_lossy(&buf).into_owned())
        };
        // Dropping `work` on timeout drops the child handle, which kills it.
        time::timeout(self.timeout, work)
            .await
            .map_err(|_| RunError::Timeout(self.timeout))?
    }
}

/// Resolves the active tab URL of browser applications.
#[derive(Clone)]
pub struct TabResolver {
    /// Runner used for query scripts.
    runner: Arc<dyn ScriptRunner>,
}

impl TabResolver {
    /// Resolver that executes queries through `runner`.
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self { runner }
    }

    /// Resolver using the `osascript` subprocess described by `cfg`.
    pub fn from_cfg(cfg: &ResolverCfg) -> Self {
        Self::new(Arc::new(OsaScript::from_cfg(cfg)))
    }

    /// Active tab URL for `app_id`, or `None`.
    ///
    /// Unknown applications return immediately without running anything.
    /// Timeouts, failed exits, oversized output, and missing interpreters all
    /// yield `None`. Trailing whitespace is trimmed; empty output is `None`.
    pub async fn resolve_active_tab_url(&self, app_id: &str) -> Option<String> {
        let Some(script) = browser::query_script(app_id) else {
            trace!(app_id, "not a known browser");
            return None;
        };
        match self.runner.run(&script).await {
            Ok(out) => {
                let url = out.trim_end();
                if url.is_empty() {
                    debug!(app_id, "tab query returned no url");
                    None
                } else {
                    Some(url.to_string())
                }
            }
            Err(e) => {
                debug!(app_id, error = %e, "tab query failed");
                None
            }
        }
    }
}
