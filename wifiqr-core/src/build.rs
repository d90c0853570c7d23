//! Document Builder - runs the typesetting engine.
//!
//! Each build gets its own scoped workspace:
//! ```text
//! {tmp}/wifiqr-XXXXXX/
//! ├── out.tex          # rendered source
//! ├── out.pdf          # engine artifact (moved out on success)
//! └── engine.stdout    # captured engine output
//! ```
//! The workspace is a `tempfile::TempDir`, so it is removed on every return
//! path, including timeouts and early errors.
//!
//! The engine runs with `SOURCE_DATE_EPOCH` and `FORCE_SOURCE_DATE` set, so
//! pdfTeX stamps a fixed date and document ID and repeated builds are
//! byte-identical.
//!
//! Owner-only permissions are applied on unix only; elsewhere the document
//! keeps the platform's default permissions.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::hashing::sha256_file;

/// Source file name inside the workspace.
pub const SOURCE_FILE: &str = "out.tex";
/// Artifact the engine produces from [`SOURCE_FILE`].
pub const ARTIFACT_FILE: &str = "out.pdf";
const STDOUT_FILE: &str = "engine.stdout";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timestamp handed to the engine, in seconds since the Unix epoch.
pub const DEFAULT_SOURCE_DATE_EPOCH: u64 = 0;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o600;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        program: String,
        timeout: Duration,
        output: String,
    },

    #[error("{program} exited with {}", describe_exit(.exit_code))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("{program} succeeded but produced no out.pdf")]
    MissingArtifact { program: String, output: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error during build: {0}")]
    Io(#[from] io::Error),
}

impl BuildError {
    /// Captured engine stdout, if the engine ran.
    pub fn engine_output(&self) -> Option<&str> {
        match self {
            BuildError::Timeout { output, .. }
            | BuildError::Failed { output, .. }
            | BuildError::MissingArtifact { output, .. } => Some(output),
            BuildError::Spawn { .. } | BuildError::Io(_) => None,
        }
    }
}

/// External typesetting command. The source file name is appended last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    pub program: String,
    pub args: Vec<String>,
}

impl Engine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `pdflatex --shell-escape -interaction=nonstopmode`
    pub fn pdflatex() -> Self {
        Self::new("pdflatex")
            .arg("--shell-escape")
            .arg("-interaction=nonstopmode")
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::pdflatex()
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output: PathBuf,
    pub sha256: String,
    pub duration: Duration,
    pub engine_output: String,
}

#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    pub engine: Engine,
    pub timeout: Duration,
    /// Parent for workspaces; the system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
    pub source_date_epoch: u64,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            timeout: DEFAULT_TIMEOUT,
            workspace_root: None,
            source_date_epoch: DEFAULT_SOURCE_DATE_EPOCH,
        }
    }
}

impl DocumentBuilder {
    pub fn new(engine: Engine, timeout: Duration) -> Self {
        Self {
            engine,
            timeout,
            workspace_root: None,
            source_date_epoch: DEFAULT_SOURCE_DATE_EPOCH,
        }
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_source_date_epoch(mut self, epoch: u64) -> Self {
        self.source_date_epoch = epoch;
        self
    }

    /// Typeset `source` and move the artifact to `target`.
    ///
    /// On any error nothing is written to `target`.
    pub fn build(&self, source: &str, target: &Path) -> Result<BuildReport, BuildError> {
        let mut workspace = tempfile::Builder::new();
        workspace.prefix("wifiqr-");
        let workspace = match &self.workspace_root {
            Some(root) => workspace.tempdir_in(root)?,
            None => workspace.tempdir()?,
        };
        debug!(workspace = %workspace.path().display(), "created temporary workspace");

        let source_path = workspace.path().join(SOURCE_FILE);
        debug!(path = %source_path.display(), bytes = source.len(), "writing source");
        fs::write(&source_path, source)?;

        let start = Instant::now();
        let output = self.run_engine(workspace.path())?;
        let duration = start.elapsed();
        debug!(?duration, "engine finished");
        trace!(output = %output, "engine output");

        let artifact = workspace.path().join(ARTIFACT_FILE);
        if !artifact.is_file() {
            warn!(program = %self.engine.program, "engine produced no artifact");
            return Err(BuildError::MissingArtifact {
                program: self.engine.program.clone(),
                output,
            });
        }

        // Everything fallible happens before the artifact reaches `target`.
        set_owner_only(&artifact)?;
        let sha256 = sha256_file(&artifact)?;
        move_into_place(&artifact, target)?;
        info!(output = %target.display(), %sha256, "document created");

        Ok(BuildReport {
            output: target.to_path_buf(),
            sha256,
            duration,
            engine_output: output,
        })
    }

    /// Run the engine in `workspace` and return its captured stdout.
    fn run_engine(&self, workspace: &Path) -> Result<String, BuildError> {
        let stdout_path = workspace.join(STDOUT_FILE);
        let stdout = File::create(&stdout_path)?;

        debug!(program = %self.engine.program, args = ?self.engine.args, "executing engine");
        let mut child = Command::new(&self.engine.program)
            .args(&self.engine.args)
            .arg(SOURCE_FILE)
            .current_dir(workspace)
            .env("SOURCE_DATE_EPOCH", self.source_date_epoch.to_string())
            .env("FORCE_SOURCE_DATE", "1")
            .stdin(Stdio::null())
            .stdout(stdout)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: self.engine.program.clone(),
                source,
            })?;

        let start = Instant::now();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        let output = read_captured(&stdout_path);
                        warn!(
                            program = %self.engine.program,
                            timeout = ?self.timeout,
                            output = %output,
                            "engine timed out"
                        );
                        return Err(BuildError::Timeout {
                            program: self.engine.program.clone(),
                            timeout: self.timeout,
                            output,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let output = read_captured(&stdout_path);
        if !status.success() {
            warn!(
                program = %self.engine.program,
                exit_code = ?status.code(),
                output = %output,
                "engine failed"
            );
            return Err(BuildError::Failed {
                program: self.engine.program.clone(),
                exit_code: status.code(),
                output,
            });
        }

        Ok(output)
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

fn read_captured(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(OUTPUT_MODE))
}

#[cfg(not(unix))]
fn set_owner_only(path: &Path) -> io::Result<()> {
    debug!(path = %path.display(), "owner-only permissions not supported on this platform");
    Ok(())
}

/// Rename `from` onto `to`. When that fails (another filesystem), copy into
/// a temporary sibling of `to` and rename that; a failed copy leaves `to`
/// untouched.
fn move_into_place(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(error = %e, "rename failed, copying instead");
            copy_into_place(from, to)
        }
    }
}

fn copy_into_place(from: &Path, to: &Path) -> io::Result<()> {
    let dir = match to.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".wifiqr-")
        .tempfile_in(dir)?;
    io::copy(&mut File::open(from)?, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    set_owner_only(staged.path())?;
    staged.persist(to).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_engine(script: &str) -> Engine {
        // `sh -c SCRIPT NAME SOURCE`: the appended source file becomes $1.
        Engine::new("sh").arg("-c").arg(script).arg("fake-engine")
    }

    fn builder(script: &str, timeout: Duration, root: &Path) -> DocumentBuilder {
        DocumentBuilder::new(fake_engine(script), timeout).with_workspace_root(root)
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_successful_build() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        fs::create_dir(&root).unwrap();
        let target = temp.path().join("net.pdf");

        let builder = builder(
            r#"echo "typesetting $1"; cp "$1" out.pdf"#,
            Duration::from_secs(10),
            &root,
        );
        let report = builder.build("hello source", &target).unwrap();

        assert_eq!(report.output, target);
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello source");
        assert!(report.engine_output.contains("typesetting out.tex"));
        assert_eq!(report.sha256.len(), 64);

        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(is_empty_dir(&root), "workspace must be removed");
    }

    #[test]
    fn test_nonzero_exit() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("net.pdf");

        let builder = builder(
            "echo '! LaTeX Error'; touch out.pdf; exit 3",
            Duration::from_secs(10),
            temp.path(),
        );
        let err = builder.build("x", &target).unwrap_err();

        match &err {
            BuildError::Failed { exit_code, output, .. } => {
                assert_eq!(*exit_code, Some(3));
                assert!(output.contains("LaTeX Error"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(err.engine_output(), Some("! LaTeX Error\n"));
        assert!(!target.exists());
        assert!(is_empty_dir(temp.path()));
    }

    #[test]
    fn test_timeout_kills_engine() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("net.pdf");

        let builder = builder(
            "echo started; exec sleep 30",
            Duration::from_millis(300),
            temp.path(),
        );
        let start = Instant::now();
        let err = builder.build("x", &target).unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(10));
        match &err {
            BuildError::Timeout { output, .. } => assert!(output.contains("started")),
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert!(!target.exists());
        assert!(is_empty_dir(temp.path()));
    }

    #[test]
    fn test_timeout_leaves_existing_target_untouched() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        fs::create_dir(&root).unwrap();
        let target = temp.path().join("net.pdf");
        fs::write(&target, "previous").unwrap();

        let builder = builder("exec sleep 30", Duration::from_millis(200), &root);
        assert!(builder.build("x", &target).is_err());

        assert_eq!(fs::read_to_string(&target).unwrap(), "previous");
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn test_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("net.pdf");

        let builder = builder("true", Duration::from_secs(10), temp.path());
        let err = builder.build("x", &target).unwrap_err();

        assert!(matches!(err, BuildError::MissingArtifact { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_missing_program() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("net.pdf");

        let builder = DocumentBuilder::new(
            Engine::new("wifiqr-no-such-engine"),
            Duration::from_secs(1),
        )
        .with_workspace_root(temp.path());
        let err = builder.build("x", &target).unwrap_err();

        assert!(matches!(err, BuildError::Spawn { .. }));
        assert!(err.engine_output().is_none());
        assert!(is_empty_dir(temp.path()));
    }

    #[test]
    fn test_engine_gets_fixed_source_date() {
        let temp = TempDir::new().unwrap();
        let script = r#"printf 'SDE=[%s] FORCE=[%s]' "$SOURCE_DATE_EPOCH" "$FORCE_SOURCE_DATE" > out.pdf"#;
        let builder = builder(script, Duration::from_secs(10), temp.path());

        let first = temp.path().join("first.pdf");
        let second = temp.path().join("second.pdf");
        let a = builder.build("x", &first).unwrap();
        let b = builder.build("x", &second).unwrap();

        assert_eq!(fs::read_to_string(&first).unwrap(), "SDE=[0] FORCE=[1]");
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn test_source_date_epoch_configurable() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("net.pdf");
        let builder = builder(
            r#"printf '%s' "$SOURCE_DATE_EPOCH" > out.pdf"#,
            Duration::from_secs(10),
            temp.path(),
        )
        .with_source_date_epoch(1_700_000_000);

        builder.build("x", &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "1700000000");
    }

    #[test]
    fn test_reported_digest_matches_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("net.pdf");
        let builder = builder(r#"cp "$1" out.pdf"#, Duration::from_secs(10), temp.path());

        let report = builder.build("digest me", &target).unwrap();
        assert_eq!(report.sha256, sha256_file(&target).unwrap());
    }

    #[test]
    fn test_unplaceable_target_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        fs::create_dir(&root).unwrap();
        let target = temp.path().join("missing-dir").join("net.pdf");

        let builder = builder(r#"cp "$1" out.pdf"#, Duration::from_secs(10), &root);
        let err = builder.build("x", &target).unwrap_err();

        assert!(matches!(err, BuildError::Io(_)));
        assert!(!target.exists());
        assert!(!temp.path().join("missing-dir").exists());
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn test_copy_into_place() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("artifact.pdf");
        let out_dir = temp.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        fs::write(&from, "pdf bytes").unwrap();
        let to = out_dir.join("net.pdf");

        copy_into_place(&from, &to).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "pdf bytes");
        let mode = fs::metadata(&to).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        let names: Vec<_> = fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("net.pdf")]);
    }

    #[test]
    fn test_failed_copy_keeps_existing_target() {
        let temp = TempDir::new().unwrap();
        let out_dir = temp.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let to = out_dir.join("net.pdf");
        fs::write(&to, "previous").unwrap();

        let err = copy_into_place(&temp.path().join("no-artifact.pdf"), &to);

        assert!(err.is_err());
        assert_eq!(fs::read_to_string(&to).unwrap(), "previous");
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 1);
    }

    #[test]
    fn test_default_engine_is_pdflatex() {
        let engine = Engine::default();
        assert_eq!(engine.program, "pdflatex");
        assert!(engine.args.contains(&"--shell-escape".to_string()));
    }
}
