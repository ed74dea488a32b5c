//! End-to-end build: source, patches, dependencies, configure/make/install,
//! package.
//!
//! The patch step sits between acquisition and configure. Under the abort
//! policy a failed patch stops the pipeline here, before any build output
//! exists.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::build::{deps, make, package, source};
use crate::core::config::BuildConfig;
use crate::core::output;
use crate::patch::{self, DetectedVersion, PatchReport, PatchTool};

/// What one pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub source: PathBuf,
    pub version: DetectedVersion,
    pub patches: PatchReport,
    pub package: Option<PathBuf>,
}

/// Run every stage of the build described by `cfg`.
pub fn run<T: PatchTool>(cfg: &BuildConfig, tool: T) -> Result<PipelineSummary> {
    let stages = 5;

    output::action_numbered(1, stages, "Acquiring source");
    let tree = source::acquire(&cfg.source, cfg.dry_run).context("Failed to acquire source")?;

    let version = match &cfg.source.version {
        Some(v) => DetectedVersion::Known(v.clone()),
        None => patch::detect_version(&tree),
    };

    output::action_numbered(2, stages, "Patching");
    let patches = if cfg.dry_run {
        preview_patches(&tree, &version, cfg)
    } else {
        patch::orchestrate(&tree, version.as_known(), &cfg.patch, tool)
            .with_context(|| format!("Patching {} failed", tree.display()))?
    };

    output::action_numbered(3, stages, "Build dependencies");
    if cfg.deps.install {
        deps::install(&cfg.deps, cfg.dry_run).context("Failed to install build dependencies")?;
    } else {
        output::skip("dependency installation not requested");
    }

    output::action_numbered(4, stages, "Building");
    let layout = make::build(&tree, &cfg.build, cfg.dry_run)
        .with_context(|| format!("Building {} failed", tree.display()))?;

    output::action_numbered(5, stages, "Packaging");
    let archive = if cfg.package.enabled {
        let archive = package::package(&layout.staging, &cfg.package, &version.to_string(), cfg.dry_run)
            .context("Failed to package staging tree")?;
        Some(archive)
    } else {
        output::skip("packaging disabled");
        None
    };

    output::success(&format!("wine {} built from {}", version, tree.display()));
    Ok(PipelineSummary {
        source: tree,
        version,
        patches,
        package: archive,
    })
}

/// Dry runs only resolve the patch directory; nothing is applied.
fn preview_patches(tree: &Path, version: &DetectedVersion, cfg: &BuildConfig) -> PatchReport {
    if cfg.patch.skip {
        output::skip("patching disabled");
        return PatchReport::Disabled;
    }
    if let Some(dir) = &cfg.patch.dir {
        output::detail(&format!("would apply patches from {}", dir.display()));
        return PatchReport::Planned { dir: dir.clone() };
    }
    let Some(v) = version.as_known() else {
        output::detail(&format!("would detect version of {}", tree.display()));
        return PatchReport::UnknownVersion;
    };
    match patch::locate(v, &cfg.patch.search_roots, &cfg.patch.prefix) {
        Some(found) => {
            output::detail(&format!("would apply patches from {}", found.dir.display()));
            PatchReport::Planned { dir: found.dir }
        }
        None => PatchReport::NotFound { version: v.to_string() },
    }
}
