//! configure / make / make install
//!
//! Every step runs with an explicit working directory and an explicit
//! toolchain environment; nothing depends on the caller's cwd. Child output
//! goes to `build.log` and only the filtered lines reach the terminal.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::build::logfilter::{self, LogSummary};
use crate::core::config::BuildSettings;
use crate::core::error::BuildError;
use crate::core::output;

/// Log file name inside the build directory
pub const BUILD_LOG: &str = "build.log";

/// Default out-of-tree build directory name
pub const DEFAULT_BUILD_DIR: &str = "build64";

/// One external command of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub name: &'static str,
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
    pub env: Vec<(&'static str, String)>,
}

impl BuildStep {
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Directories one build uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub source: PathBuf,
    pub build_dir: PathBuf,
    pub staging: PathBuf,
    pub log: PathBuf,
}

impl BuildLayout {
    pub fn new(source: &Path, settings: &BuildSettings) -> Self {
        let source = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
        let build_dir = settings
            .build_dir
            .clone()
            .unwrap_or_else(|| source.join(DEFAULT_BUILD_DIR));
        Self {
            staging: build_dir.join("staging"),
            log: build_dir.join(BUILD_LOG),
            build_dir,
            source,
        }
    }
}

/// configure, make and make install for `layout`, in that order.
pub fn plan(layout: &BuildLayout, settings: &BuildSettings) -> Vec<BuildStep> {
    let env = settings.toolchain.env_pairs();

    let mut configure_args = vec![format!("--prefix={}", settings.prefix.display())];
    if settings.win64 {
        configure_args.push("--enable-win64".to_string());
    }
    configure_args.extend(settings.configure_args.iter().cloned());

    vec![
        BuildStep {
            name: "configure",
            program: layout.source.join("configure").display().to_string(),
            args: configure_args,
            dir: layout.build_dir.clone(),
            env: env.clone(),
        },
        BuildStep {
            name: "make",
            program: "make".to_string(),
            args: vec![format!("-j{}", settings.jobs.max(1))],
            dir: layout.build_dir.clone(),
            env: env.clone(),
        },
        BuildStep {
            name: "install",
            program: "make".to_string(),
            args: vec![
                "install".to_string(),
                format!("DESTDIR={}", layout.staging.display()),
            ],
            dir: layout.build_dir.clone(),
            env,
        },
    ]
}

/// Run one step, appending its output to `log`.
pub fn run_step(step: &BuildStep, log: &Path, dry_run: bool) -> Result<LogSummary, BuildError> {
    if dry_run {
        output::detail(&format!("would run in {}: {}", step.dir.display(), step.command_line()));
        return Ok(LogSummary::default());
    }

    std::fs::create_dir_all(&step.dir)?;
    let mut file = OpenOptions::new().create(true).append(true).open(log)?;
    writeln!(file, "==> {}: {}", step.name, step.command_line())?;
    let offset = file.metadata()?.len();
    let stderr: File = file.try_clone()?;

    let pb = output::spinner(&format!("{}...", step.name));
    let status = Command::new(&step.program)
        .args(&step.args)
        .current_dir(&step.dir)
        .envs(step.env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::from(stderr))
        .status();
    output::progress_done(pb);

    let status = status.map_err(|e| {
        BuildError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to start {}: {}", step.program, e),
        ))
    })?;

    let summary = logfilter::summarize_file(log, offset)?;
    report(step, &summary);

    if !status.success() {
        output::error(&format!("full log: {}", log.display()));
        return Err(BuildError::CommandFailed {
            cmd: step.command_line(),
            code: status.code(),
        });
    }
    Ok(summary)
}

fn report(step: &BuildStep, summary: &LogSummary) {
    for line in &summary.shown {
        output::detail(line);
    }
    if summary.errors > 0 {
        output::warning(&format!(
            "{}: {} error line(s), {} warning(s)",
            step.name, summary.errors, summary.warnings
        ));
    } else {
        output::success(&format!("{} done ({} warnings)", step.name, summary.warnings));
    }
}

/// Run the full configure/make/install sequence.
pub fn build(source: &Path, settings: &BuildSettings, dry_run: bool) -> Result<BuildLayout, BuildError> {
    let layout = BuildLayout::new(source, settings);
    let steps = plan(&layout, settings);
    for (i, step) in steps.iter().enumerate() {
        output::action_numbered(i + 1, steps.len(), step.name);
        run_step(step, &layout.log, dry_run)?;
    }
    Ok(layout)
}
