//! Patch orchestration
//!
//! Version detection, patch set lookup, tiered application and the
//! aggregate verdict, in that order. Everything is sequential; the only
//! shared state is the source tree itself, held under an exclusive lock.
//!
//! ```ignore
//! let report = patch::orchestrate(&tree, None, &cfg.patch, GnuPatch::default())?;
//! if let Some(result) = report.result() {
//!     println!("{} applied", result.applied);
//! }
//! ```

pub mod apply;
pub mod detect;
pub mod locate;
pub mod manifest;
pub mod outcome;
pub mod tool;

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::config::{FailurePolicy, PatchConfig};
use crate::core::error::PatchError;
use crate::core::lock;
use crate::core::output;

pub use apply::Applier;
pub use detect::{DetectedVersion, detect_version};
pub use locate::{Located, MatchRule, PatchSet, locate};
pub use outcome::{OrchestrationResult, OverallStatus, PatchOutcome, PatchRecord};
pub use tool::{GnuPatch, PatchTool};

/// How the patch step ended.
///
/// `Completed::rule` carries how the directory was matched; a
/// `Some(MatchRule::BestEffort)` set may belong to another release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchReport {
    /// Patching disabled in config
    Disabled,
    /// Version could not be detected; build continues unpatched
    UnknownVersion,
    /// No patch directory for this version; build continues unpatched
    NotFound { version: String },
    /// Dry run: the patch directory that would be applied
    Planned { dir: PathBuf },
    /// Patch set was processed
    Completed {
        dir: PathBuf,
        rule: Option<MatchRule>,
        result: OrchestrationResult,
    },
}

impl PatchReport {
    pub fn result(&self) -> Option<&OrchestrationResult> {
        match self {
            Self::Completed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Status of the processed set; anything short of `Completed` applied nothing.
    pub fn status(&self) -> OverallStatus {
        self.result()
            .map_or(OverallStatus::NoPatches, OrchestrationResult::status)
    }

    /// Machine-readable view of this report under `policy`.
    pub fn summary(&self, policy: FailurePolicy) -> PatchSummary<'_> {
        PatchSummary {
            status: self.status(),
            on_failure: policy,
            report: self,
        }
    }

    /// False only when patches failed.
    pub fn is_success(&self) -> bool {
        self.result().is_none_or(OrchestrationResult::is_success)
    }

    /// Apply the failure policy: under `Abort`, failed patches are an error.
    pub fn enforce(&self, policy: FailurePolicy) -> Result<(), PatchError> {
        match self.result() {
            Some(result) if !result.is_success() && policy == FailurePolicy::Abort => {
                Err(PatchError::PatchesFailed {
                    failed: result.failed_patches.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// JSON shape of `wine-builder patch --json`.
#[derive(Debug, Serialize)]
pub struct PatchSummary<'a> {
    pub status: OverallStatus,
    pub on_failure: FailurePolicy,
    #[serde(flatten)]
    pub report: &'a PatchReport,
}

/// Run the whole patch step against `tree`.
///
/// `version` overrides detection. With `FailurePolicy::Abort` any failed
/// patch turns into [`PatchError::PatchesFailed`] after the summary is
/// printed; with `Warn` the report is returned and the caller proceeds.
pub fn orchestrate<T: PatchTool>(
    tree: &Path,
    version: Option<&str>,
    cfg: &PatchConfig,
    tool: T,
) -> Result<PatchReport, PatchError> {
    let report = orchestrate_report(tree, version, cfg, tool)?;
    report.enforce(cfg.on_failure)?;
    Ok(report)
}

/// Like [`orchestrate`], but failed patches never become an error; the
/// caller decides via [`PatchReport::enforce`].
pub fn orchestrate_report<T: PatchTool>(
    tree: &Path,
    version: Option<&str>,
    cfg: &PatchConfig,
    tool: T,
) -> Result<PatchReport, PatchError> {
    if cfg.skip {
        output::skip("patching disabled");
        return Ok(PatchReport::Disabled);
    }

    if !tree.is_dir() {
        return Err(PatchError::MissingSourceTree(tree.to_path_buf()));
    }

    let (dir, rule) = match &cfg.dir {
        Some(dir) => (dir.clone(), None),
        None => {
            let detected = match version {
                Some(v) => DetectedVersion::Known(v.to_string()),
                None => detect_version(tree),
            };
            let Some(version) = detected.as_known() else {
                output::warning("could not detect source version, skipping patches");
                return Ok(PatchReport::UnknownVersion);
            };
            output::info(&format!("source version: {}", version));

            let Some(found) = locate(version, &cfg.search_roots, &cfg.prefix) else {
                output::warning(&format!(
                    "no patch directory for {}-{} (searched: {})",
                    cfg.prefix,
                    version,
                    describe_roots(&cfg.search_roots)
                ));
                return Ok(PatchReport::NotFound {
                    version: version.to_string(),
                });
            };
            output::detail(&format!("patch root: {}", found.root.display()));
            if found.rule == MatchRule::BestEffort {
                output::warning(&format!(
                    "no exact patch set for {}, using {} (version may not match)",
                    version,
                    found.dir.display()
                ));
            }
            (found.dir, Some(found.rule))
        }
    };

    let set = PatchSet::from_dir(&dir)?;
    let result = apply_located(tree, &set, cfg, tool)?;
    Ok(PatchReport::Completed { dir, rule, result })
}

/// Verify, lock, apply and summarise one located patch set.
pub fn apply_located<T: PatchTool>(
    tree: &Path,
    set: &PatchSet,
    cfg: &PatchConfig,
    tool: T,
) -> Result<OrchestrationResult, PatchError> {
    if set.is_empty() {
        output::warning(&format!("no patches found in {}", set.dir.display()));
        return Ok(OrchestrationResult::default());
    }

    if cfg.verify_checksums {
        for name in manifest::verify_patch_set(set)? {
            output::warning(&format!("{} is not listed in the checksum manifest", name));
        }
    }

    let _lock = lock::acquire_tree_lock(tree)?;

    output::action(&format!(
        "Applying {} patch(es) from {}",
        set.len(),
        set.dir.display()
    ));
    let applier = Applier::new(tool).detect_existing_files(cfg.detect_existing_files);
    let result = applier.apply_set(tree, set)?;
    print_summary(&result, cfg.on_failure);
    Ok(result)
}

fn describe_roots(roots: &[PathBuf]) -> String {
    if roots.is_empty() {
        return "no search roots".to_string();
    }
    roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print counts, and a block naming every failed patch.
pub fn print_summary(result: &OrchestrationResult, policy: FailurePolicy) {
    let counts = format!(
        "{} applied, {} with fuzz, {} already applied, {} failed",
        result.applied, result.applied_with_fuzz, result.already_applied, result.failed
    );

    if result.is_success() {
        output::success(&format!("patches ok: {}", counts));
        return;
    }

    output::error(&format!("patches failed: {}", counts));
    for name in &result.failed_patches {
        output::error(&format!("  {}", name));
    }
    match policy {
        FailurePolicy::Abort => output::error("stopping before configure"),
        FailurePolicy::Warn => output::warning("continuing with failed patches"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::tool::ToolReport;
    use tempfile::TempDir;

    /// Every dry run succeeds, except for patches whose name contains "bad".
    struct NameTool;

    impl PatchTool for NameTool {
        fn dry_run(&self, _t: &Path, patch: &Path, _f: u32) -> Result<ToolReport, PatchError> {
            let bad = patch.to_string_lossy().contains("bad");
            Ok(ToolReport {
                success: !bad,
                diagnostics: if bad { "Hunk #1 FAILED".into() } else { String::new() },
            })
        }

        fn apply(&self, _t: &Path, _p: &Path, _f: u32) -> Result<ToolReport, PatchError> {
            Ok(ToolReport {
                success: true,
                diagnostics: String::new(),
            })
        }
    }

    fn fixture(patches: &[&str]) -> (TempDir, PathBuf, PatchConfig) {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("wine-10.4");
        std::fs::create_dir(&tree).unwrap();
        std::fs::write(tree.join("VERSION"), "Wine version 10.4\n").unwrap();

        let root = tmp.path().join("patches");
        let dir = root.join("wine-10.4");
        std::fs::create_dir_all(&dir).unwrap();
        for p in patches {
            std::fs::write(dir.join(p), "").unwrap();
        }

        let cfg = PatchConfig {
            search_roots: vec![root],
            ..Default::default()
        };
        (tmp, tree, cfg)
    }

    #[test]
    fn test_completed_success() {
        let (_tmp, tree, cfg) = fixture(&["0001-a.patch", "0002-b.patch"]);
        let report = orchestrate(&tree, None, &cfg, NameTool).unwrap();
        let result = report.result().unwrap();
        assert_eq!(result.applied, 2);
        assert!(report.is_success());
        assert!(matches!(report, PatchReport::Completed { rule: Some(MatchRule::Exact), .. }));
    }

    #[test]
    fn test_abort_policy_turns_failure_into_error() {
        let (_tmp, tree, cfg) = fixture(&["0001-a.patch", "0002-bad.patch"]);
        let err = orchestrate(&tree, None, &cfg, NameTool).unwrap_err();
        match err {
            PatchError::PatchesFailed { failed } => assert_eq!(failed, vec!["0002-bad.patch"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_warn_policy_returns_report() {
        let (_tmp, tree, mut cfg) = fixture(&["0001-bad.patch", "0002-b.patch"]);
        cfg.on_failure = FailurePolicy::Warn;
        let report = orchestrate(&tree, None, &cfg, NameTool).unwrap();
        let result = report.result().unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.applied, 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_defers_policy_to_caller() {
        let (_tmp, tree, cfg) = fixture(&["0001-bad.patch"]);
        let report = orchestrate_report(&tree, None, &cfg, NameTool).unwrap();
        assert_eq!(report.result().unwrap().failed, 1);
        assert!(report.enforce(FailurePolicy::Warn).is_ok());
        assert!(matches!(
            report.enforce(FailurePolicy::Abort),
            Err(PatchError::PatchesFailed { .. })
        ));
    }

    #[test]
    fn test_unknown_version_is_soft() {
        let (_tmp, tree, cfg) = fixture(&["0001-a.patch"]);
        std::fs::remove_file(tree.join("VERSION")).unwrap();
        let report = orchestrate(&tree, None, &cfg, NameTool).unwrap();
        assert_eq!(report, PatchReport::UnknownVersion);
        assert!(report.is_success());
    }

    #[test]
    fn test_version_override_skips_detection() {
        let (_tmp, tree, cfg) = fixture(&["0001-a.patch"]);
        let report = orchestrate(&tree, Some("12.0"), &cfg, NameTool).unwrap();
        // only wine-10.4 exists, so the override lands on the best-effort rule
        assert!(matches!(report, PatchReport::Completed { rule: Some(MatchRule::BestEffort), .. }));
    }

    #[test]
    fn test_summary_names_the_report_kind() {
        let not_found = PatchReport::NotFound { version: "10.4".into() };
        let json = serde_json::to_value(not_found.summary(FailurePolicy::Abort)).unwrap();
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["version"], "10.4");
        assert_eq!(json["status"], "no_patches");
        assert_eq!(json["on_failure"], "abort");
        assert!(json.get("result").is_none());

        let json = serde_json::to_value(PatchReport::UnknownVersion.summary(FailurePolicy::Warn)).unwrap();
        assert_eq!(json["kind"], "unknown_version");
        assert_eq!(json["on_failure"], "warn");

        let json = serde_json::to_value(PatchReport::Disabled.summary(FailurePolicy::Warn)).unwrap();
        assert_eq!(json["kind"], "disabled");
    }

    #[test]
    fn test_summary_of_completed_run() {
        let (_tmp, tree, mut cfg) = fixture(&["0001-a.patch", "0002-bad.patch"]);
        cfg.on_failure = FailurePolicy::Warn;
        let report = orchestrate(&tree, Some("11.0"), &cfg, NameTool).unwrap();
        assert_eq!(report.status(), OverallStatus::Failed);

        let json = serde_json::to_value(report.summary(cfg.on_failure)).unwrap();
        assert_eq!(json["kind"], "completed");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["rule"], "best_effort");
        assert_eq!(json["result"]["applied"], 1);
        assert_eq!(json["result"]["failed_patches"][0], "0002-bad.patch");
    }

    #[test]
    fn test_not_found_is_soft() {
        let (_tmp, tree, mut cfg) = fixture(&[]);
        cfg.search_roots = vec![PathBuf::from("/nonexistent/patches")];
        let report = orchestrate(&tree, None, &cfg, NameTool).unwrap();
        assert_eq!(report, PatchReport::NotFound { version: "10.4".into() });
    }

    #[test]
    fn test_empty_set_is_warning_not_failure() {
        let (_tmp, tree, cfg) = fixture(&[]);
        let report = orchestrate(&tree, None, &cfg, NameTool).unwrap();
        assert_eq!(report.result().unwrap().status(), OverallStatus::NoPatches);
    }

    #[test]
    fn test_missing_tree_is_hard() {
        let (_tmp, tree, cfg) = fixture(&["0001-a.patch"]);
        let err = orchestrate(&tree.join("missing"), None, &cfg, NameTool).unwrap_err();
        assert!(matches!(err, PatchError::MissingSourceTree(_)));
    }

    #[test]
    fn test_disabled() {
        let (_tmp, tree, mut cfg) = fixture(&["0001-a.patch"]);
        cfg.skip = true;
        assert_eq!(orchestrate(&tree, None, &cfg, NameTool).unwrap(), PatchReport::Disabled);
    }

    #[test]
    fn test_explicit_dir_bypasses_locator() {
        let (tmp, tree, mut cfg) = fixture(&[]);
        let dir = tmp.path().join("custom");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("0001-x.patch"), "").unwrap();
        cfg.dir = Some(dir.clone());
        let report = orchestrate(&tree, None, &cfg, NameTool).unwrap();
        assert!(matches!(report, PatchReport::Completed { rule: None, ref dir, .. } if *dir == tmp.path().join("custom")));
    }
}
