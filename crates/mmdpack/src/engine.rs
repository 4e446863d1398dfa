//! Concrete [`RenderEngine`]s.
//!
//! - [`NativeEngine`] renders in-process (feature `mermaid-rs`)
//! - [`CommandEngine`] shells out to a Mermaid CLI such as `mmdc`

use mmdpack_core::{EngineError, RenderEngine};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Renders with `mermaid-rs-renderer` using its modern theme.
#[cfg(feature = "mermaid-rs")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

#[cfg(feature = "mermaid-rs")]
impl RenderEngine for NativeEngine {
    fn render(&self, target_id: &str, source_text: &str) -> Result<String, EngineError> {
        let options = mermaid_rs_renderer::RenderOptions {
            theme: mermaid_rs_renderer::Theme::modern(),
            layout: mermaid_rs_renderer::LayoutConfig::default(),
        };
        mermaid_rs_renderer::render_with_options(source_text, options)
            .map_err(|err| EngineError::syntax(format!("{target_id}: {err}")))
    }
}

/// Runs an external Mermaid CLI once per diagram.
///
/// The source is written to `{target_id}.mmd` in a fresh temporary directory and the CLI is
/// invoked as `<program> [extra args] -i <input> -o <output.svg>`. A non-zero exit is treated as
/// a rejected diagram and carries the tool's stderr; failing to start the tool or finding no
/// output is an engine failure.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: OsString,
    args: Vec<OsString>,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new("mmdc")
    }
}

impl CommandEngine {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments passed before the input/output flags (e.g. `-b transparent`).
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &std::ffi::OsStr {
        &self.program
    }

    fn io_paths(dir: &std::path::Path, target_id: &str) -> (PathBuf, PathBuf) {
        let stem = file_stem(target_id);
        (
            dir.join(format!("{stem}.mmd")),
            dir.join(format!("{stem}.svg")),
        )
    }
}

/// Keeps `[A-Za-z0-9_-]` and replaces everything else, so a target id cannot leave the temp dir.
fn file_stem(target_id: &str) -> String {
    let stem: String = target_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "diagram".to_string()
    } else {
        stem
    }
}

impl RenderEngine for CommandEngine {
    fn render(&self, target_id: &str, source_text: &str) -> Result<String, EngineError> {
        let dir = tempfile::tempdir().map_err(|err| internal("temp dir", err))?;
        let (input, output) = Self::io_paths(dir.path(), target_id);
        std::fs::write(&input, source_text).map_err(|err| internal("write input", err))?;

        let program = self.program.to_string_lossy();
        let out = Command::new(&self.program)
            .args(&self.args)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| internal(&format!("failed to run {program}"), err))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let stderr = stderr.trim();
            tracing::debug!(%program, status = %out.status, "mermaid CLI rejected diagram");
            return Err(EngineError::syntax(if stderr.is_empty() {
                format!("{program} exited with {}", out.status)
            } else {
                stderr.to_string()
            }));
        }

        std::fs::read_to_string(&output)
            .map_err(|err| internal(&format!("{program} produced no SVG"), err))
    }
}

fn internal(what: &str, err: impl std::fmt::Display) -> EngineError {
    EngineError::internal(format!("{what}: {err}"))
}
