//! Persisting artifacts: the only place generated code touches the disk.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use idlgen_core::Artifact;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};

/// What to do when the target file already exists with other content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    #[default]
    Fail,
    SkipExisting,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The file already holds exactly this content.
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError {
    pub path: PathBuf,
    pub message: String,
}

impl WriteError {
    fn new(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for WriteError {}

pub trait ArtifactWriter {
    fn write(&mut self, artifact: &Artifact) -> Result<WriteOutcome, WriteError>;
}

/// External formatter run on artifacts before they are compared and written,
/// e.g. `ruff format`. It is invoked with the path of a scratch copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    program: String,
    args: Vec<String>,
}

impl Formatter {
    /// Split a command line on whitespace; `None` when it is blank.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Formatted `content` for the file at `path`.
    ///
    /// The scratch file keeps the target's extension and lives next to the
    /// target when that directory exists, so the formatter picks up the
    /// project's own settings.
    pub fn format(&self, path: &Path, content: &str) -> Result<String, String> {
        let suffix = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix(".idlgen-").suffix(&suffix);
        let mut scratch = match path.parent().filter(|parent| parent.is_dir()) {
            Some(parent) => builder.tempfile_in(parent),
            None => builder.tempfile(),
        }
        .map_err(|err| format!("failed to create scratch file: {err}"))?;

        scratch
            .write_all(content.as_bytes())
            .map_err(|err| format!("failed to write scratch file: {err}"))?;
        self.run(scratch.path())?;
        fs::read_to_string(scratch.path()).map_err(|err| format!("failed to read formatted output: {err}"))
    }

    fn run(&self, path: &Path) -> Result<(), String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|err| format!("failed to run `{}`: {err}", self.display()))?;
        if output.status.success() {
            return Ok(());
        }
        Err(format!(
            "`{}` exited with {}: {}",
            self.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

/// The content that ends up on disk: formatted when a formatter applies,
/// the raw generated text when it fails.
fn final_content<'a>(formatter: Option<&Formatter>, artifact: &'a Artifact) -> Cow<'a, str> {
    let Some(formatter) = formatter.filter(|_| artifact.format) else {
        return Cow::Borrowed(&artifact.content);
    };
    match formatter.format(&artifact.path, &artifact.content) {
        Ok(formatted) => Cow::Owned(formatted),
        Err(err) => {
            warn!(path = %artifact.path.display(), "Formatter failed: {err}");
            Cow::Borrowed(&artifact.content)
        }
    }
}

/// Decide what a policy does with an existing file.
fn existing_outcome(path: &Path, policy: WritePolicy, content: &str) -> Result<Option<WriteOutcome>, WriteError> {
    let existing = match fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(WriteError::new(path, format!("failed to read existing file: {err}"))),
    };
    if existing == content {
        return Ok(Some(WriteOutcome::Unchanged));
    }
    match policy {
        WritePolicy::Fail => Err(WriteError::new(
            path,
            "file already exists with different content (use --force or --skip-existing)",
        )),
        WritePolicy::SkipExisting => Ok(Some(WriteOutcome::Skipped)),
        WritePolicy::Overwrite => Ok(None),
    }
}

/// Writes artifacts to the filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsWriter {
    policy: WritePolicy,
    formatter: Option<Formatter>,
}

impl FsWriter {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            policy,
            formatter: None,
        }
    }

    pub fn with_formatter(mut self, formatter: Option<Formatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

impl ArtifactWriter for FsWriter {
    fn write(&mut self, artifact: &Artifact) -> Result<WriteOutcome, WriteError> {
        let path = &artifact.path;
        let content = final_content(self.formatter.as_ref(), artifact);
        if let Some(outcome) = existing_outcome(path, self.policy, &content)? {
            debug!(path = %path.display(), ?outcome, "Not writing artifact.");
            return Ok(outcome);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| WriteError::new(path, format!("failed to create directory: {err}")))?;
        }
        fs::write(path, content.as_bytes()).map_err(|err| WriteError::new(path, format!("failed to write: {err}")))?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote artifact.");
        Ok(WriteOutcome::Written)
    }
}

/// Renders what [`FsWriter`] would do as unified diffs, touching nothing.
#[derive(Debug, Clone, Default)]
pub struct DryRunWriter {
    policy: WritePolicy,
    formatter: Option<Formatter>,
    output: String,
}

impl DryRunWriter {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            policy,
            formatter: None,
            output: String::new(),
        }
    }

    pub fn with_formatter(mut self, formatter: Option<Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Accumulated diffs of every artifact that would be written.
    pub fn output(&self) -> &str {
        &self.output
    }
}

/// Unified diff with three lines of context.
pub fn render_diff(path: &Path, existing: Option<&str>, new: &str) -> String {
    let old = existing.unwrap_or("");
    let label = if existing.is_some() { "current" } else { "new file" };
    let diff = TextDiff::from_lines(old, new);

    let mut output = format!("--- {} ({label})\n+++ {} (generated)\n", path.display(), path.display());
    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                output.push_str(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
            }
        }
    }
    output
}

impl ArtifactWriter for DryRunWriter {
    fn write(&mut self, artifact: &Artifact) -> Result<WriteOutcome, WriteError> {
        let path = &artifact.path;
        let content = final_content(self.formatter.as_ref(), artifact);
        if let Some(outcome) = existing_outcome(path, self.policy, &content)? {
            return Ok(outcome);
        }
        let existing = fs::read_to_string(path).ok();
        self.output
            .push_str(&render_diff(path, existing.as_deref(), &content));
        Ok(WriteOutcome::Written)
    }
}

/// Per-artifact results of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<WriteError>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} written, {} unchanged, {} skipped, {} failed",
            self.written.len(),
            self.unchanged.len(),
            self.skipped.len(),
            self.failures.len()
        )
    }
}

/// Write every artifact, continuing past individual failures.
pub fn write_all(writer: &mut dyn ArtifactWriter, artifacts: &[Artifact]) -> WriteReport {
    let mut report = WriteReport::default();
    for artifact in artifacts {
        match writer.write(artifact) {
            Ok(WriteOutcome::Written) => report.written.push(artifact.path.clone()),
            Ok(WriteOutcome::Unchanged) => report.unchanged.push(artifact.path.clone()),
            Ok(WriteOutcome::Skipped) => report.skipped.push(artifact.path.clone()),
            Err(err) => {
                warn!(path = %err.path.display(), "Failed to write artifact: {}", err.message);
                report.failures.push(err);
            }
        }
    }
    info!(
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "Finished writing artifacts."
    );
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(dir: &TempDir, rel: &str, content: &str) -> Artifact {
        Artifact::new(dir.path().join(rel), content.to_string())
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let mut writer = FsWriter::new(WritePolicy::Fail);
        let a = artifact(&dir, "pkg/models/post.py", "x = 1\n");
        assert_eq!(writer.write(&a).unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_identical_content_is_unchanged_under_every_policy() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.py", "same\n");
        fs::write(&a.path, "same\n").unwrap();
        for policy in [WritePolicy::Fail, WritePolicy::SkipExisting, WritePolicy::Overwrite] {
            assert_eq!(FsWriter::new(policy).write(&a).unwrap(), WriteOutcome::Unchanged);
        }
    }

    #[test]
    fn test_policies_on_conflicting_file() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.py", "new\n");
        fs::write(&a.path, "old\n").unwrap();

        let err = FsWriter::new(WritePolicy::Fail).write(&a).unwrap_err();
        assert_eq!(err.path, a.path);
        assert!(err.message.contains("already exists"));

        assert_eq!(FsWriter::new(WritePolicy::SkipExisting).write(&a).unwrap(), WriteOutcome::Skipped);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), "old\n");

        assert_eq!(FsWriter::new(WritePolicy::Overwrite).write(&a).unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), "new\n");
    }

    #[test]
    fn test_write_all_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        let conflict = artifact(&dir, "conflict.py", "new\n");
        fs::write(&conflict.path, "old\n").unwrap();
        let fresh = artifact(&dir, "fresh.py", "fresh\n");

        let mut writer = FsWriter::new(WritePolicy::Fail);
        let report = write_all(&mut writer, &[conflict.clone(), fresh.clone()]);
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, conflict.path);
        assert_eq!(report.written, vec![fresh.path]);
        assert_eq!(report.summary(), "1 written, 0 unchanged, 0 skipped, 1 failed");
    }

    #[test]
    fn test_formatter_failure_is_not_a_write_failure() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.py", "x = 1\n");
        let mut writer =
            FsWriter::new(WritePolicy::Fail).with_formatter(Formatter::parse("idlgen-test-missing-formatter --check"));
        assert_eq!(writer.write(&a).unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), "x = 1\n");
    }

    /// A formatter that upper-cases the file it is given.
    #[cfg(unix)]
    fn upper_case_formatter(dir: &TempDir) -> Option<Formatter> {
        let script = dir.path().join("upper.sh");
        fs::write(&script, "tr a-z A-Z < \"$1\" > \"$1.out\" && mv \"$1.out\" \"$1\"\n").unwrap();
        Formatter::parse(&format!("sh {}", script.display()))
    }

    #[cfg(unix)]
    #[test]
    fn test_formatted_output_is_stable_across_runs() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "pkg/a.py", "x = 1\n");

        let mut first = FsWriter::new(WritePolicy::Fail).with_formatter(upper_case_formatter(&dir));
        assert_eq!(first.write(&a).unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), "X = 1\n");

        let mut second = FsWriter::new(WritePolicy::Fail).with_formatter(upper_case_formatter(&dir));
        assert_eq!(second.write(&a).unwrap(), WriteOutcome::Unchanged);

        // No scratch files are left beside the output.
        let entries: Vec<_> = fs::read_dir(dir.path().join("pkg")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_dry_run_diffs_formatted_content() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.py", "y = 2\n");
        fs::write(&a.path, "Y = 2\n").unwrap();

        let mut writer = DryRunWriter::new(WritePolicy::Fail).with_formatter(upper_case_formatter(&dir));
        assert_eq!(writer.write(&a).unwrap(), WriteOutcome::Unchanged);
        assert!(writer.output().is_empty());
    }

    #[test]
    fn test_unformatted_artifacts_bypass_the_formatter() {
        let dir = TempDir::new().unwrap();
        let mut a = artifact(&dir, "a.py", "x = 1\n");
        a.format = false;
        let mut writer = FsWriter::new(WritePolicy::Fail).with_formatter(Formatter::parse("idlgen-test-missing-formatter"));
        assert_eq!(writer.write(&a).unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_formatter_parse() {
        let formatter = Formatter::parse("  ruff   format ").unwrap();
        assert_eq!(formatter.display(), "ruff format");
        assert!(Formatter::parse("   ").is_none());
    }

    #[test]
    fn test_dry_run_renders_diffs_without_writing() {
        let dir = TempDir::new().unwrap();
        let existing = artifact(&dir, "a.py", "x = 1\ny = 3\n");
        fs::write(&existing.path, "x = 1\ny = 2\n").unwrap();
        let fresh = artifact(&dir, "b.py", "z = 1\n");

        let mut writer = DryRunWriter::new(WritePolicy::Overwrite);
        let report = write_all(&mut writer, &[existing.clone(), fresh.clone()]);
        assert_eq!(report.written.len(), 2);
        assert!(!fresh.path.exists());
        assert_eq!(fs::read_to_string(&existing.path).unwrap(), "x = 1\ny = 2\n");

        let output = writer.output();
        assert!(output.contains("(current)\n"));
        assert!(output.contains("-y = 2\n+y = 3\n"));
        assert!(output.contains("(new file)\n"));
        assert!(output.contains("+z = 1\n"));
    }
}
