//! Patch application with tiered fallback.
//!
//! Per patch: strict (fuzz 0), then relaxed (fuzz 3), then a look at the
//! dry-run diagnostics to spot patches that are already in the tree. Each
//! tier is dry-run before the real application so a patch that ends up
//! `AlreadyApplied` or `Failed` never touches the tree.

use std::path::Path;

use crate::core::error::PatchError;
use crate::core::output;

use super::locate::PatchSet;
use super::outcome::{OrchestrationResult, PatchOutcome, PatchRecord};
use super::tool::{DryRunSignal, PatchTool, RELAXED_FUZZ, classify_diagnostics};

/// Applies patch sets through a [`PatchTool`].
pub struct Applier<T: PatchTool> {
    tool: T,
    detect_existing_files: bool,
    quiet: bool,
}

impl<T: PatchTool> Applier<T> {
    pub fn new(tool: T) -> Self {
        Self {
            tool,
            detect_existing_files: false,
            quiet: false,
        }
    }

    /// Count "file already exists" dry-run diagnostics as already applied.
    pub fn detect_existing_files(mut self, enabled: bool) -> Self {
        self.detect_existing_files = enabled;
        self
    }

    /// Suppress per-patch status lines.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Attempt one patch against `tree`.
    pub fn apply_one(&self, tree: &Path, patch: &Path) -> Result<PatchOutcome, PatchError> {
        let strict = self.tool.dry_run(tree, patch, 0)?;
        if strict.success {
            return self.commit(tree, patch, 0, PatchOutcome::Applied);
        }

        let relaxed = self.tool.dry_run(tree, patch, RELAXED_FUZZ)?;
        if relaxed.success {
            return self.commit(tree, patch, RELAXED_FUZZ, PatchOutcome::AppliedWithFuzz);
        }

        // A fuzzily applied patch only shows up as reversed under fuzz,
        // so the relaxed diagnostics get a second look.
        let signal = match classify_diagnostics(&strict.diagnostics, self.detect_existing_files) {
            DryRunSignal::Rejected => {
                classify_diagnostics(&relaxed.diagnostics, self.detect_existing_files)
            }
            signal => signal,
        };

        Ok(match signal {
            DryRunSignal::Reversed | DryRunSignal::FilesExist => PatchOutcome::AlreadyApplied,
            DryRunSignal::Rejected => PatchOutcome::Failed,
        })
    }

    fn commit(
        &self,
        tree: &Path,
        patch: &Path,
        fuzz: u32,
        on_success: PatchOutcome,
    ) -> Result<PatchOutcome, PatchError> {
        let report = self.tool.apply(tree, patch, fuzz)?;
        if report.success {
            Ok(on_success)
        } else {
            if !self.quiet {
                output::detail(report.diagnostics.trim());
            }
            Ok(PatchOutcome::Failed)
        }
    }

    /// Apply every patch in `set`, in order. A failure does not stop the loop.
    pub fn apply_set(&self, tree: &Path, set: &PatchSet) -> Result<OrchestrationResult, PatchError> {
        let mut records = Vec::with_capacity(set.len());

        for patch in &set.patches {
            let name = patch
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| patch.display().to_string());

            let outcome = self.apply_one(tree, patch)?;
            if !self.quiet {
                let ok = match outcome {
                    PatchOutcome::Failed => Some(false),
                    o if o.mutated_tree() => Some(true),
                    _ => None,
                };
                output::patch_status(&name, outcome.label(), ok);
            }
            records.push(PatchRecord { name, outcome });
        }

        Ok(OrchestrationResult::from_records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::tool::ToolReport;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Scripted tool: dry-run results keyed by (patch name, fuzz).
    #[derive(Default)]
    struct FakeTool {
        dry: HashMap<(String, u32), ToolReport>,
        apply_fails: Vec<String>,
        applied: RefCell<Vec<(String, u32)>>,
    }

    fn name_of(p: &Path) -> String {
        p.file_name().unwrap().to_string_lossy().to_string()
    }

    impl FakeTool {
        fn dry(mut self, name: &str, fuzz: u32, success: bool, diagnostics: &str) -> Self {
            self.dry.insert(
                (name.to_string(), fuzz),
                ToolReport {
                    success,
                    diagnostics: diagnostics.to_string(),
                },
            );
            self
        }
    }

    impl PatchTool for FakeTool {
        fn dry_run(&self, _tree: &Path, patch: &Path, fuzz: u32) -> Result<ToolReport, PatchError> {
            Ok(self
                .dry
                .get(&(name_of(patch), fuzz))
                .cloned()
                .unwrap_or(ToolReport {
                    success: false,
                    diagnostics: "Hunk #1 FAILED at 1.".to_string(),
                }))
        }

        fn apply(&self, _tree: &Path, patch: &Path, fuzz: u32) -> Result<ToolReport, PatchError> {
            let name = name_of(patch);
            self.applied.borrow_mut().push((name.clone(), fuzz));
            Ok(ToolReport {
                success: !self.apply_fails.contains(&name),
                diagnostics: String::new(),
            })
        }
    }

    const REVERSED: &str = "Reversed (or previously applied) patch detected!  Skipping patch.";
    const EXISTS: &str = "The next patch would create the file x.c,\nwhich already exists!  Skipping patch.";

    fn set_of(names: &[&str]) -> PatchSet {
        PatchSet {
            dir: PathBuf::from("/patches/wine-10.4"),
            patches: names.iter().map(|n| PathBuf::from("/patches/wine-10.4").join(n)).collect(),
            manifest: None,
        }
    }

    #[test]
    fn test_strict_success_is_applied() {
        let tool = FakeTool::default().dry("a.patch", 0, true, "");
        let applier = Applier::new(tool).quiet(true);
        let outcome = applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(*applier.tool.applied.borrow(), vec![("a.patch".to_string(), 0)]);
    }

    #[test]
    fn test_fuzz_fallback() {
        let tool = FakeTool::default().dry("a.patch", RELAXED_FUZZ, true, "");
        let applier = Applier::new(tool).quiet(true);
        let outcome = applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap();
        assert_eq!(outcome, PatchOutcome::AppliedWithFuzz);
        assert_eq!(*applier.tool.applied.borrow(), vec![("a.patch".to_string(), RELAXED_FUZZ)]);
    }

    #[test]
    fn test_reversed_is_already_applied_without_mutation() {
        let tool = FakeTool::default().dry("a.patch", 0, false, REVERSED);
        let applier = Applier::new(tool).quiet(true);
        let outcome = applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
        assert!(applier.tool.applied.borrow().is_empty());
    }

    #[test]
    fn test_reversed_under_fuzz_is_already_applied() {
        let tool = FakeTool::default()
            .dry("a.patch", 0, false, "Hunk #1 FAILED at 1.")
            .dry("a.patch", RELAXED_FUZZ, false, REVERSED);
        let applier = Applier::new(tool).quiet(true);
        let outcome = applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
    }

    #[test]
    fn test_files_exist_depends_on_setting() {
        let tool = FakeTool::default().dry("a.patch", 0, false, EXISTS);
        let applier = Applier::new(tool).quiet(true);
        assert_eq!(
            applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap(),
            PatchOutcome::Failed
        );

        let tool = FakeTool::default().dry("a.patch", 0, false, EXISTS);
        let applier = Applier::new(tool).quiet(true).detect_existing_files(true);
        assert_eq!(
            applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap(),
            PatchOutcome::AlreadyApplied
        );
    }

    #[test]
    fn test_apply_failing_after_dry_run_is_failed() {
        let mut tool = FakeTool::default().dry("a.patch", 0, true, "");
        tool.apply_fails.push("a.patch".to_string());
        let applier = Applier::new(tool).quiet(true);
        let outcome = applier.apply_one(Path::new("/src"), Path::new("a.patch")).unwrap();
        assert_eq!(outcome, PatchOutcome::Failed);
    }

    #[test]
    fn test_failure_does_not_short_circuit() {
        let tool = FakeTool::default()
            .dry("0001.patch", 0, true, "")
            .dry("0003.patch", RELAXED_FUZZ, true, "")
            .dry("0004.patch", 0, false, REVERSED);
        let applier = Applier::new(tool).quiet(true);
        let set = set_of(&["0001.patch", "0002.patch", "0003.patch", "0004.patch"]);

        let result = applier.apply_set(Path::new("/src"), &set).unwrap();
        let outcomes: Vec<PatchOutcome> = result.records.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                PatchOutcome::Applied,
                PatchOutcome::Failed,
                PatchOutcome::AppliedWithFuzz,
                PatchOutcome::AlreadyApplied,
            ]
        );
        assert_eq!(result.failed_patches, vec!["0002.patch"]);
        assert!(!result.is_success());
    }
}
