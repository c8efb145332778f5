//! Mermaid CLI (`mmdc`) driven out-of-process.
//!
//! Loading locates the binary and probes `mmdc --version`, which boots the headless browser
//! bundle once and is the slow first-use cost. Each render writes the source and the current
//! configuration into a scratch directory and runs one `mmdc` invocation.
//!
//! The process and file I/O go through Tokio, so loads and renders must be polled inside a
//! Tokio runtime. Outside one they fail with [`EngineError::Load`] (an `Unknown` render error)
//! instead of panicking.

use super::{Engine, EngineError, EngineLoader};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use sirenia_core::EngineConfig;
use std::path::PathBuf;
use tokio::process::Command;

/// Overrides the `mmdc` executable looked up on `PATH`.
pub const MMDC_ENV: &str = "SIRENIA_MMDC";

const SYNTAX_MARKERS: [&str; 3] = ["Parse error", "Syntax error", "Lexical error"];

#[derive(Debug, Clone, Default)]
pub struct MermaidCliLoader {
    program: Option<PathBuf>,
    extra_args: Vec<String>,
}

impl MermaidCliLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Extra arguments appended to every render, e.g. `-p puppeteer.json`.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    fn resolve_program(&self) -> Result<PathBuf, EngineError> {
        if let Some(program) = &self.program {
            return Ok(program.clone());
        }
        if let Some(program) = std::env::var_os(MMDC_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(program));
        }
        which::which("mmdc").map_err(|err| EngineError::Load(format!("mmdc not found: {err}")))
    }
}

impl EngineLoader for MermaidCliLoader {
    type Engine = MermaidCli;

    fn load(&self) -> BoxFuture<'static, Result<MermaidCli, EngineError>> {
        let program = self.resolve_program();
        let extra_args = self.extra_args.clone();
        async move {
            require_runtime()?;
            let program = program?;
            let output = Command::new(&program)
                .arg("--version")
                .output()
                .await
                .map_err(|err| {
                    EngineError::Load(format!("failed to run {}: {err}", program.display()))
                })?;
            if !output.status.success() {
                return Err(EngineError::Load(format!(
                    "{} --version exited with {}: {}",
                    program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            tracing::debug!(program = %program.display(), %version, "found mermaid CLI");
            Ok(MermaidCli {
                program,
                extra_args,
                version,
                config: Mutex::new(EngineConfig::default()),
            })
        }
        .boxed()
    }
}

#[derive(Debug)]
pub struct MermaidCli {
    program: PathBuf,
    extra_args: Vec<String>,
    version: String,
    config: Mutex<EngineConfig>,
}

impl MermaidCli {
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Engine for MermaidCli {
    fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError> {
        *self.config.lock() = config.clone();
        Ok(())
    }

    fn render<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
    ) -> BoxFuture<'a, Result<String, EngineError>> {
        let config = self.config.lock().clone();
        async move {
            require_runtime()?;
            let scratch = tempfile::tempdir()
                .map_err(|err| EngineError::Render(format!("scratch directory: {err}")))?;
            let input = scratch.path().join("diagram.mmd");
            let output = scratch.path().join("diagram.svg");
            let config_path = scratch.path().join("config.json");

            let config_json = serde_json::to_vec(config.as_value())
                .map_err(|err| EngineError::Render(format!("engine config: {err}")))?;
            tokio::fs::write(&config_path, config_json)
                .await
                .map_err(|err| EngineError::Render(format!("write config: {err}")))?;
            tokio::fs::write(&input, source)
                .await
                .map_err(|err| EngineError::Render(format!("write diagram: {err}")))?;

            let run = Command::new(&self.program)
                .arg("-i")
                .arg(&input)
                .arg("-o")
                .arg(&output)
                .arg("-c")
                .arg(&config_path)
                .arg("-I")
                .arg(id)
                .arg("-q")
                .args(&self.extra_args)
                .output()
                .await
                .map_err(|err| EngineError::Render(format!("failed to run mmdc: {err}")))?;
            if !run.status.success() {
                return Err(classify_failure(&String::from_utf8_lossy(&run.stderr)));
            }

            tokio::fs::read_to_string(&output)
                .await
                .map_err(|err| EngineError::Render(format!("read output: {err}")))
        }
        .boxed()
    }
}

fn require_runtime() -> Result<(), EngineError> {
    match tokio::runtime::Handle::try_current() {
        Ok(_) => Ok(()),
        Err(_) => Err(EngineError::Load(
            "the mmdc engine must run inside a Tokio runtime".to_string(),
        )),
    }
}

/// Splits CLI failures into syntax errors (the user's diagram) and everything else.
pub(crate) fn classify_failure(stderr: &str) -> EngineError {
    let stderr = stderr.trim();
    let message = stderr
        .lines()
        .skip_while(|line| !SYNTAX_MARKERS.iter().any(|m| line.contains(m)))
        .take(4)
        .collect::<Vec<_>>()
        .join("\n");
    if message.is_empty() {
        let first = stderr.lines().next().unwrap_or("mmdc failed without output");
        EngineError::Render(first.to_string())
    } else {
        EngineError::Syntax(message)
    }
}
