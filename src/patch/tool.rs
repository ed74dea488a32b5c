//! Adapter around the external `patch` program.
//!
//! The applier only sees success/failure plus a [`DryRunSignal`]; matching on
//! GNU patch's message text is confined to [`classify_diagnostics`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::core::error::PatchError;

/// Context fuzz used for the relaxed attempt
pub const RELAXED_FUZZ: u32 = 3;

/// Leading path components stripped from patch file names (`a/`, `b/`)
pub const STRIP_LEVEL: u32 = 1;

/// What one invocation of the tool reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReport {
    pub success: bool,
    /// Combined stdout and stderr
    pub diagnostics: String,
}

/// Reading of a failed dry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunSignal {
    /// Changes are already present (reverse applies cleanly)
    Reversed,
    /// A file the patch creates already exists
    FilesExist,
    Rejected,
}

/// Something that can dry-run and apply a unified diff against a tree.
pub trait PatchTool {
    /// Check whether `patch` applies with the given fuzz. Must not modify `tree`.
    fn dry_run(&self, tree: &Path, patch: &Path, fuzz: u32) -> Result<ToolReport, PatchError>;

    /// Apply `patch` to `tree` with the given fuzz.
    fn apply(&self, tree: &Path, patch: &Path, fuzz: u32) -> Result<ToolReport, PatchError>;
}

/// GNU patch, run with `current_dir(tree)`.
///
/// `--forward` makes an already-applied patch fail instead of being reverted,
/// and `--reject-file=-` keeps `.rej` files out of the tree.
#[derive(Debug, Clone)]
pub struct GnuPatch {
    program: PathBuf,
}

impl Default for GnuPatch {
    fn default() -> Self {
        Self {
            program: PathBuf::from("patch"),
        }
    }
}

impl GnuPatch {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments shared by dry runs and real applications
    pub fn base_args(patch: &Path, fuzz: u32) -> Vec<String> {
        vec![
            format!("-p{}", STRIP_LEVEL),
            "--forward".to_string(),
            "--batch".to_string(),
            "--no-backup-if-mismatch".to_string(),
            "--reject-file=-".to_string(),
            format!("--fuzz={}", fuzz),
            "-i".to_string(),
            patch.to_string_lossy().to_string(),
        ]
    }

    fn run(&self, tree: &Path, args: &[String]) -> Result<ToolReport, PatchError> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(tree)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| PatchError::ToolSpawn {
                tool: self.program.display().to_string(),
                source,
            })?;

        let mut diagnostics = String::from_utf8_lossy(&output.stdout).to_string();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolReport {
            success: output.status.success(),
            diagnostics,
        })
    }
}

impl PatchTool for GnuPatch {
    fn dry_run(&self, tree: &Path, patch: &Path, fuzz: u32) -> Result<ToolReport, PatchError> {
        // patch runs inside the tree, so a relative patch path would dangle
        let patch = std::path::absolute(patch)?;
        let mut args = vec!["--dry-run".to_string()];
        args.extend(Self::base_args(&patch, fuzz));
        self.run(tree, &args)
    }

    fn apply(&self, tree: &Path, patch: &Path, fuzz: u32) -> Result<ToolReport, PatchError> {
        let patch = std::path::absolute(patch)?;
        self.run(tree, &Self::base_args(&patch, fuzz))
    }
}

/// Classify the diagnostics of a failed dry run.
///
/// A reversed signal anywhere in the output wins. The files-exist signal is
/// only honoured when `detect_existing_files` is set.
pub fn classify_diagnostics(text: &str, detect_existing_files: bool) -> DryRunSignal {
    if text.contains("Reversed (or previously applied) patch detected") {
        return DryRunSignal::Reversed;
    }
    if detect_existing_files && text.contains("which already exists") {
        return DryRunSignal::FilesExist;
    }
    DryRunSignal::Rejected
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVERSED: &str = "checking file dlls/ntdll/loader.c\nReversed (or previously applied) patch detected!  Skipping patch.\n1 out of 1 hunk ignored\n";
    const EXISTS: &str = "The next patch would create the file dlls/foo/new.c,\nwhich already exists!  Skipping patch.\n1 out of 1 hunk ignored\n";
    const FAILED: &str = "checking file configure.ac\nHunk #1 FAILED at 12.\n1 out of 1 hunk FAILED\n";

    #[test]
    fn test_classify_reversed() {
        assert_eq!(classify_diagnostics(REVERSED, false), DryRunSignal::Reversed);
        assert_eq!(classify_diagnostics(REVERSED, true), DryRunSignal::Reversed);
    }

    #[test]
    fn test_classify_files_exist_is_opt_in() {
        assert_eq!(classify_diagnostics(EXISTS, false), DryRunSignal::Rejected);
        assert_eq!(classify_diagnostics(EXISTS, true), DryRunSignal::FilesExist);
    }

    #[test]
    fn test_classify_rejected() {
        assert_eq!(classify_diagnostics(FAILED, true), DryRunSignal::Rejected);
        assert_eq!(classify_diagnostics("", true), DryRunSignal::Rejected);
    }

    #[test]
    fn test_base_args() {
        let args = GnuPatch::base_args(Path::new("/p/0001-fix.patch"), 3);
        assert_eq!(
            args,
            vec![
                "-p1",
                "--forward",
                "--batch",
                "--no-backup-if-mismatch",
                "--reject-file=-",
                "--fuzz=3",
                "-i",
                "/p/0001-fix.patch",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let tool = GnuPatch::with_program("/nonexistent/bin/patch");
        let err = tool
            .dry_run(Path::new("/tmp"), Path::new("x.patch"), 0)
            .unwrap_err();
        assert!(matches!(err, PatchError::ToolSpawn { .. }));
    }
}
