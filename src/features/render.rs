//! Renderer invocation
//!
//! The actual typesetting is done by an external engine (the KaTeX command
//! line interface under Node by default). Each fragment is one exchange:
//! the expanded TeX is written to the child's stdin, stdin is closed, stdout
//! and stderr are drained to EOF and the exit status decides the outcome.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};

use crate::utils::error::RenderFailure;

/// Flag that puts the KaTeX CLI into display mode
pub const DISPLAY_MODE_FLAG: &str = "--display-mode";

/// Trait for math renderers
///
/// Implementations:
/// - `KatexRenderer`: spawns the KaTeX CLI (production)
/// - test doubles that return canned output
pub trait Renderer {
    /// Render display-mode math, returning the engine's raw output
    fn render_display(&self, tex: &str) -> Result<String, RenderFailure>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render_display(&self, tex: &str) -> Result<String, RenderFailure> {
        (**self).render_display(tex)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render_display(&self, tex: &str) -> Result<String, RenderFailure> {
        (**self).render_display(tex)
    }
}

/// Renderer that runs the KaTeX CLI as a child process
#[derive(Debug, Clone)]
pub struct KatexRenderer {
    program: String,
    script: Option<PathBuf>,
    args: Vec<String>,
}

impl KatexRenderer {
    /// `node <script> --display-mode`
    pub fn new(program: impl Into<String>, script: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script,
            args: Vec::new(),
        }
    }

    /// Run `program` directly, without a script argument
    pub fn command(program: impl Into<String>) -> Self {
        Self::new(program, None)
    }

    /// Extra arguments placed before the display-mode flag
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program, display-mode flag included
    pub fn arguments(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        if let Some(ref script) = self.script {
            args.push(script.to_string_lossy().to_string());
        }
        args.extend(self.args.iter().cloned());
        args.push(DISPLAY_MODE_FLAG.to_string());
        args
    }
}

impl Default for KatexRenderer {
    fn default() -> Self {
        Self::new("node", Some(PathBuf::from("katex/cli.js")))
    }
}

impl Renderer for KatexRenderer {
    fn render_display(&self, tex: &str) -> Result<String, RenderFailure> {
        let args = self.arguments();
        debug!(program = %self.program, ?args, "spawning renderer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderFailure::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();

        // Feed stdin from a scoped thread while this one drains the output
        // pipes, so a large fragment cannot fill both directions at once.
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(tex.as_bytes())?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (written, output)
        });

        let output = output?;
        match written {
            // The child stopped reading; its exit status tells us why
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("renderer closed stdin early");
            }
            Err(e) => return Err(RenderFailure::Io(e)),
            Ok(()) => {}
        }

        if !output.status.success() {
            return Err(RenderFailure::ExitStatus {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| RenderFailure::InvalidUtf8)?;
        info!(bytes = stdout.len(), "rendered fragment");
        Ok(stdout)
    }
}
