//! Renderer: compiles LaTeX to PDF with an external engine.
//!
//! Each render gets its own OS-unique work directory. The directory and
//! everything the engine wrote into it are removed before `render` returns,
//! on success and on every failure path.

pub mod latex;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

const TEX_FILE: &str = "resume.tex";
const PDF_FILE: &str = "resume.pdf";
const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("work directory I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not start LaTeX engine '{engine}': {source}")]
    Spawn {
        engine: String,
        source: std::io::Error,
    },

    #[error("LaTeX engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("LaTeX engine exited with {status:?}: {log_tail}")]
    Compiler {
        status: Option<i32>,
        log_tail: String,
    },

    #[error("LaTeX engine produced no PDF")]
    MissingOutput,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
    work_root: PathBuf,
}

impl Renderer {
    /// `engine` is a program optionally followed by arguments that precede
    /// the standard ones, e.g. `pdflatex` or `latexmk -pdf`.
    pub fn new(engine: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut parts = engine.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("LaTeX engine must not be empty"))?;
        Ok(Self {
            program,
            leading_args: parts.collect(),
            timeout,
            work_root: std::env::temp_dir(),
        })
    }

    #[cfg(test)]
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    /// Compiles `latex` and returns the PDF bytes.
    pub async fn render(&self, latex: &str, owner: &str) -> Result<Vec<u8>, RenderError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("tailor-{}-", owner_tag(owner)))
            .tempdir_in(&self.work_root)?;

        let result = self.compile(dir.path(), latex).await;

        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            warn!("Failed to remove render directory {}: {e}", path.display());
        }

        if let Ok(pdf) = &result {
            info!("Rendered {} byte PDF for {owner}", pdf.len());
        }
        result
    }

    async fn compile(&self, dir: &Path, latex: &str) -> Result<Vec<u8>, RenderError> {
        let tex_path = dir.join(TEX_FILE);
        tokio::fs::write(&tex_path, latex).await?;

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(format!("-output-directory={}", dir.display()))
            .arg(&tex_path)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                engine: self.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))??;

        if !output.status.success() {
            let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
            log.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(RenderError::Compiler {
                status: output.status.code(),
                log_tail: tail(&log, LOG_TAIL_LINES),
            });
        }

        match tokio::fs::read(dir.join(PDF_FILE)).await {
            Ok(pdf) => Ok(pdf),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::MissingOutput),
            Err(e) => Err(RenderError::Io(e)),
        }
    }
}

fn owner_tag(owner: &str) -> String {
    owner
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(64)
        .collect()
}

fn tail(log: &str, lines: usize) -> String {
    let all: Vec<&str> = log.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Writes a shell script standing in for the LaTeX engine. It receives the
    /// same arguments pdflatex would.
    fn fake_engine(scripts: &tempfile::TempDir, body: &str) -> String {
        let path = scripts.path().join("engine.sh");
        let script = format!(
            "#!/bin/sh\n\
             for arg in \"$@\"; do\n\
               case \"$arg\" in -output-directory=*) out=\"${{arg#-output-directory=}}\";; esac\n\
             done\n\
             {body}\n"
        );
        std::fs::write(&path, script).unwrap();
        format!("sh {}", path.display())
    }

    fn renderer(engine: &str, work_root: &tempfile::TempDir, timeout: Duration) -> Renderer {
        Renderer::new(engine, timeout)
            .unwrap()
            .with_work_root(work_root.path())
    }

    fn is_empty(dir: &tempfile::TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_successful_render_returns_pdf_and_cleans_up() {
        let scripts = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            &scripts,
            "test -f \"$out/resume.tex\" || exit 3\n\
             printf '%%PDF-1.4 fake' > \"$out/resume.pdf\"\n\
             echo aux > \"$out/resume.aux\"\n\
             echo log > \"$out/resume.log\"",
        );

        let pdf = renderer(&engine, &root, Duration::from_secs(10))
            .render("\\documentclass{article}", "user-1")
            .await
            .unwrap();

        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(is_empty(&root));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_fatal_and_cleans_up() {
        let scripts = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            &scripts,
            "printf '%%PDF-1.4 partial' > \"$out/resume.pdf\"\n\
             echo '! Undefined control sequence.'\n\
             exit 1",
        );

        let err = renderer(&engine, &root, Duration::from_secs(10))
            .render("\\badmacro", "user-1")
            .await
            .unwrap_err();

        match err {
            RenderError::Compiler { status, log_tail } => {
                assert_eq!(status, Some(1));
                assert!(log_tail.contains("Undefined control sequence"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(is_empty(&root));
    }

    #[tokio::test]
    async fn test_timeout_kills_engine_and_cleans_up() {
        let scripts = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let engine = fake_engine(&scripts, "exec sleep 5");

        let err = renderer(&engine, &root, Duration::from_millis(200))
            .render("\\documentclass{article}", "user-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Timeout(_)));
        assert!(is_empty(&root));
    }

    #[tokio::test]
    async fn test_missing_pdf_is_an_error() {
        let scripts = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let engine = fake_engine(&scripts, "exit 0");

        let err = renderer(&engine, &root, Duration::from_secs(10))
            .render("\\documentclass{article}", "user-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::MissingOutput));
        assert!(is_empty(&root));
    }

    #[tokio::test]
    async fn test_unknown_engine_fails_to_spawn_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let err = renderer("tailor-no-such-latex-engine", &root, Duration::from_secs(1))
            .render("x", "user-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Spawn { .. }));
        assert!(is_empty(&root));
    }

    #[test]
    fn test_empty_engine_rejected() {
        assert!(Renderer::new("   ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_owner_tag_is_path_safe() {
        assert_eq!(owner_tag("../../etc/passwd"), "etcpasswd");
        assert_eq!(
            owner_tag("4f1c2b9e-0000-4000-8000-000000000000"),
            "4f1c2b9e-0000-4000-8000-000000000000"
        );
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
