//! wine-builder CLI
//!
//! Usage:
//!   wine-builder detect <SOURCE>            Print the source tree's version
//!   wine-builder locate <VERSION>           Print the patch directory for a version
//!   wine-builder patch <SOURCE>             Apply the matching patch set
//!   wine-builder build                      Fetch, patch, build and package
//!   wine-builder deps                       Install build dependencies

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use wine_builder::build::deps;
use wine_builder::core::config::{self, BuildConfig, FailurePolicy};
use wine_builder::patch::{self, GnuPatch, MatchRule, PatchReport};
use wine_builder::{output, pipeline};

#[derive(Parser)]
#[command(name = "wine-builder")]
#[command(about = "Apply version-matched patch sets to Wine sources and build them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file, applied after the XDG config files
    #[arg(short, long, global = true, env = "WINE_BUILDER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected version of a source tree
    Detect {
        /// Wine source tree
        source: PathBuf,
    },

    /// Print the patch directory chosen for a version
    Locate {
        /// Wine version, e.g. 10.4
        version: String,

        /// Patch root to search (repeatable, first existing wins)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,

        /// Version directory prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Apply the matching patch set to a source tree
    Patch {
        /// Wine source tree
        source: PathBuf,

        /// Use this version instead of detecting it
        #[arg(long)]
        version: Option<String>,

        /// Patch directory to apply, bypassing the lookup
        #[arg(long)]
        patches: Option<PathBuf>,

        /// What a failed patch means: abort or warn
        #[arg(long, value_parser = FailurePolicy::parse)]
        on_failure: Option<FailurePolicy>,

        /// Count "file already exists" conflicts as already applied
        #[arg(long)]
        detect_existing_files: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch, patch, build and package Wine
    Build {
        /// Source directory or archive
        #[arg(long)]
        source: Option<PathBuf>,

        /// Release to download when no source is given
        #[arg(long)]
        version: Option<String>,

        /// Parallel make jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Installation prefix
        #[arg(long)]
        prefix: Option<PathBuf>,

        /// Skip the packaging step
        #[arg(long)]
        no_package: bool,

        /// Install build dependencies first
        #[arg(long)]
        install_deps: bool,

        /// Print what would run without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Install Wine build dependencies
    Deps {
        /// Package manager to use (apt, dnf, pacman)
        #[arg(long)]
        manager: Option<String>,

        /// Print the install command without running it
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref()).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Detect { source } => {
            let version = patch::detect_version(&source);
            println!("{}", version);
            if !version.is_known() {
                std::process::exit(1);
            }
        }

        Commands::Locate {
            version,
            roots,
            prefix,
        } => {
            if !roots.is_empty() {
                cfg.patch.search_roots = roots;
            }
            if let Some(prefix) = prefix {
                cfg.patch.prefix = prefix;
            }
            fill_search_roots(&mut cfg, None)?;

            match patch::locate(&version, &cfg.patch.search_roots, &cfg.patch.prefix) {
                Some(found) => {
                    println!("{}", found.dir.display());
                    if found.rule == MatchRule::BestEffort {
                        output::warning(&format!("best-effort match for {}", version));
                    }
                }
                None => {
                    output::error(&format!("no patch directory for {}", version));
                    std::process::exit(1);
                }
            }
        }

        Commands::Patch {
            source,
            version,
            patches,
            on_failure,
            detect_existing_files,
            json,
        } => {
            if let Some(dir) = patches {
                cfg.patch.dir = Some(dir);
            }
            if let Some(policy) = on_failure {
                cfg.patch.on_failure = policy;
            }
            if detect_existing_files {
                cfg.patch.detect_existing_files = true;
            }
            fill_search_roots(&mut cfg, Some(&source))?;
            output::set_quiet(json);

            let report =
                patch::orchestrate_report(&source, version.as_deref(), &cfg.patch, GnuPatch::default())
                    .with_context(|| format!("Failed to patch {}", source.display()))?;

            if json {
                let summary = report.summary(cfg.patch.on_failure);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                describe_report(&report);
            }

            if let Err(e) = report.enforce(cfg.patch.on_failure) {
                output::error(&e.to_string());
                std::process::exit(1);
            }
        }

        Commands::Build {
            source,
            version,
            jobs,
            prefix,
            no_package,
            install_deps,
            dry_run,
        } => {
            if let Some(source) = source {
                cfg.source.dir = Some(source);
            }
            if let Some(version) = version {
                cfg.source.version = Some(version);
            }
            if let Some(jobs) = jobs {
                cfg.build.jobs = jobs.max(1);
            }
            if let Some(prefix) = prefix {
                cfg.build.prefix = prefix;
            }
            if no_package {
                cfg.package.enabled = false;
            }
            if install_deps {
                cfg.deps.install = true;
            }
            cfg.dry_run = dry_run;
            let source = cfg.source.dir.clone();
            fill_search_roots(&mut cfg, source.as_deref())?;

            let summary = pipeline::run(&cfg, GnuPatch::default())?;
            if let Some(archive) = summary.package {
                println!("{}", archive.display());
            }
        }

        Commands::Deps { manager, dry_run } => {
            if manager.is_some() {
                cfg.deps.manager = manager;
            }
            output::action("Installing build dependencies");
            let pm = deps::install(&cfg.deps, dry_run)?;
            output::success(&format!("done ({})", pm.program()));
        }
    }

    Ok(())
}

/// Use the default roots when neither config nor CLI named any.
fn fill_search_roots(cfg: &mut BuildConfig, source: Option<&Path>) -> Result<()> {
    if !cfg.patch.search_roots.is_empty() {
        return Ok(());
    }
    let exe = std::env::current_exe().ok();
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    cfg.patch.search_roots = config::default_search_roots(exe.as_deref(), &cwd, source);
    Ok(())
}

fn describe_report(report: &PatchReport) {
    match report {
        PatchReport::Disabled => output::info("patching disabled"),
        PatchReport::UnknownVersion => output::info("version unknown, tree left unpatched"),
        PatchReport::NotFound { version } => {
            output::info(&format!("no patches for {}, tree left unpatched", version))
        }
        PatchReport::Planned { dir } => output::info(&format!("would apply {}", dir.display())),
        PatchReport::Completed { dir, rule, .. } => {
            let how = match rule {
                Some(MatchRule::Exact) => "exact match",
                Some(MatchRule::MajorMinor) => "major.minor match",
                Some(MatchRule::BestEffort) => "best-effort match",
                None => "explicit directory",
            };
            output::info(&format!("patch set {} ({})", dir.display(), how));
        }
    }
}
