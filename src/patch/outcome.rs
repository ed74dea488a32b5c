//! Per-patch outcomes and their aggregate.

use serde::Serialize;
use std::fmt;

/// Result of attempting one patch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOutcome {
    Applied,
    AppliedWithFuzz,
    AlreadyApplied,
    Failed,
}

impl PatchOutcome {
    /// Label used in status lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AppliedWithFuzz => "applied with fuzz",
            Self::AlreadyApplied => "already applied",
            Self::Failed => "FAILED",
        }
    }

    /// True for outcomes that changed the source tree
    pub fn mutated_tree(&self) -> bool {
        matches!(self, Self::Applied | Self::AppliedWithFuzz)
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One patch and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRecord {
    pub name: String,
    pub outcome: PatchOutcome,
}

/// Overall state of an orchestration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Nothing to apply; flow continues
    NoPatches,
    Success,
    Failed,
}

/// Aggregate over every outcome of a patch set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestrationResult {
    pub total: usize,
    pub applied: usize,
    pub applied_with_fuzz: usize,
    pub already_applied: usize,
    pub failed: usize,
    /// File names of failed patches, in application order
    pub failed_patches: Vec<String>,
    pub records: Vec<PatchRecord>,
}

impl OrchestrationResult {
    /// Reduce a sequence of records.
    pub fn from_records(records: Vec<PatchRecord>) -> Self {
        let mut result = Self {
            total: records.len(),
            ..Default::default()
        };
        for record in &records {
            match record.outcome {
                PatchOutcome::Applied => result.applied += 1,
                PatchOutcome::AppliedWithFuzz => result.applied_with_fuzz += 1,
                PatchOutcome::AlreadyApplied => result.already_applied += 1,
                PatchOutcome::Failed => {
                    result.failed += 1;
                    result.failed_patches.push(record.name.clone());
                }
            }
        }
        result.records = records;
        result
    }

    /// Success means zero failures. An empty set is a success too.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn status(&self) -> OverallStatus {
        if self.total == 0 {
            OverallStatus::NoPatches
        } else if self.failed == 0 {
            OverallStatus::Success
        } else {
            OverallStatus::Failed
        }
    }
}
