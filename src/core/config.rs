//! Build configuration
//!
//! Every choice the pipeline needs (version, patch policy, compiler flags,
//! packaging) is resolved once into a [`BuildConfig`] before anything runs.
//! TOML layers are read from the XDG config dirs, then an explicit file, and
//! merged field by field; the binary applies CLI overrides last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name under `<config dir>/wine-builder/`
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default patch directory prefix (`wine-10.4`, `wine-9.22`, ...)
pub const DEFAULT_PATCH_PREFIX: &str = "wine";

/// What a failed patch means for the rest of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop before configure if any patch failed.
    #[default]
    Abort,
    /// Report failed patches and keep building.
    Warn,
}

impl FailurePolicy {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "warn" => Ok(Self::Warn),
            other => Err(format!(
                "invalid failure policy '{other}' (expected 'abort' or 'warn')"
            )),
        }
    }
}

/// Where the source tree comes from. Checked in this order: dir, url, version.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Existing source directory, or a local archive
    pub dir: Option<PathBuf>,
    /// Archive URL
    pub url: Option<String>,
    /// Release to fetch from dl.winehq.org
    pub version: Option<String>,
    /// Where downloaded archives and extracted trees go
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PatchConfig {
    pub prefix: String,
    /// Explicit patch directory; bypasses the locator
    pub dir: Option<PathBuf>,
    /// Candidate roots, in preference order
    pub search_roots: Vec<PathBuf>,
    pub on_failure: FailurePolicy,
    /// Treat "file already exists" dry-run diagnostics as already applied
    pub detect_existing_files: bool,
    pub verify_checksums: bool,
    pub skip: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PATCH_PREFIX.to_string(),
            dir: None,
            search_roots: Vec::new(),
            on_failure: FailurePolicy::default(),
            detect_existing_files: false,
            verify_checksums: true,
            skip: false,
        }
    }
}

/// Compiler and flag settings passed explicitly to every build command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub cflags: Option<String>,
    pub cxxflags: Option<String>,
    pub ldflags: Option<String>,
}

impl Toolchain {
    /// Environment pairs for child processes. Unset fields are omitted so
    /// configure picks its own defaults.
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let fields = [
            ("CC", &self.cc),
            ("CXX", &self.cxx),
            ("CFLAGS", &self.cflags),
            ("CXXFLAGS", &self.cxxflags),
            ("LDFLAGS", &self.ldflags),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                pairs.push((key, v.clone()));
            }
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub prefix: PathBuf,
    pub jobs: usize,
    pub win64: bool,
    pub configure_args: Vec<String>,
    /// Out-of-tree build directory; defaults to `<source>/build64`
    pub build_dir: Option<PathBuf>,
    pub toolchain: Toolchain,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from("/usr/local"),
            jobs: num_cpus::get().max(1),
            win64: true,
            configure_args: Vec::new(),
            build_dir: None,
            toolchain: Toolchain::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DepsConfig {
    pub install: bool,
    /// Forced package manager; auto-detected when unset
    pub manager: Option<String>,
    pub assume_yes: bool,
}

#[derive(Debug, Clone)]
pub struct PackageConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub name: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("."),
            name: "wine".to_string(),
        }
    }
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub source: SourceConfig,
    pub patch: PatchConfig,
    pub build: BuildSettings,
    pub deps: DepsConfig,
    pub package: PackageConfig,
    /// Print commands instead of running them
    pub dry_run: bool,
}

// ----------------------------------------------------------------------------
// TOML layers
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    source: Option<SourceToml>,
    patch: Option<PatchToml>,
    build: Option<BuildToml>,
    deps: Option<DepsToml>,
    package: Option<PackageToml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceToml {
    dir: Option<PathBuf>,
    url: Option<String>,
    version: Option<String>,
    download_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PatchToml {
    prefix: Option<String>,
    dir: Option<PathBuf>,
    search_roots: Option<Vec<PathBuf>>,
    on_failure: Option<FailurePolicy>,
    detect_existing_files: Option<bool>,
    verify_checksums: Option<bool>,
    skip: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BuildToml {
    prefix: Option<PathBuf>,
    jobs: Option<usize>,
    win64: Option<bool>,
    configure_args: Option<Vec<String>>,
    build_dir: Option<PathBuf>,
    cc: Option<String>,
    cxx: Option<String>,
    cflags: Option<String>,
    cxxflags: Option<String>,
    ldflags: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DepsToml {
    install: Option<bool>,
    manager: Option<String>,
    assume_yes: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    enabled: Option<bool>,
    output_dir: Option<PathBuf>,
    name: Option<String>,
}

/// Overwrite `dst` with `src` when `src` is set.
fn take<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

/// Merge an optional sub-table field by field.
fn merge_table<T>(dst: &mut Option<T>, src: Option<T>, merge: impl FnOnce(&mut T, T)) {
    match (dst.as_mut(), src) {
        (Some(d), Some(s)) => merge(d, s),
        (None, Some(s)) => *dst = Some(s),
        _ => {}
    }
}

impl ConfigToml {
    fn merge(&mut self, other: ConfigToml) {
        merge_table(&mut self.source, other.source, |d, s| {
            take(&mut d.dir, s.dir);
            take(&mut d.url, s.url);
            take(&mut d.version, s.version);
            take(&mut d.download_dir, s.download_dir);
        });
        merge_table(&mut self.patch, other.patch, |d, s| {
            take(&mut d.prefix, s.prefix);
            take(&mut d.dir, s.dir);
            take(&mut d.search_roots, s.search_roots);
            take(&mut d.on_failure, s.on_failure);
            take(&mut d.detect_existing_files, s.detect_existing_files);
            take(&mut d.verify_checksums, s.verify_checksums);
            take(&mut d.skip, s.skip);
        });
        merge_table(&mut self.build, other.build, |d, s| {
            take(&mut d.prefix, s.prefix);
            take(&mut d.jobs, s.jobs);
            take(&mut d.win64, s.win64);
            take(&mut d.configure_args, s.configure_args);
            take(&mut d.build_dir, s.build_dir);
            take(&mut d.cc, s.cc);
            take(&mut d.cxx, s.cxx);
            take(&mut d.cflags, s.cflags);
            take(&mut d.cxxflags, s.cxxflags);
            take(&mut d.ldflags, s.ldflags);
        });
        merge_table(&mut self.deps, other.deps, |d, s| {
            take(&mut d.install, s.install);
            take(&mut d.manager, s.manager);
            take(&mut d.assume_yes, s.assume_yes);
        });
        merge_table(&mut self.package, other.package, |d, s| {
            take(&mut d.enabled, s.enabled);
            take(&mut d.output_dir, s.output_dir);
            take(&mut d.name, s.name);
        });
    }

    fn resolve(self) -> BuildConfig {
        let mut cfg = BuildConfig::default();
        cfg.source.download_dir = default_download_dir();

        if let Some(s) = self.source {
            cfg.source.dir = s.dir;
            cfg.source.url = s.url;
            cfg.source.version = s.version;
            if let Some(d) = s.download_dir {
                cfg.source.download_dir = d;
            }
        }
        if let Some(p) = self.patch {
            if let Some(prefix) = p.prefix {
                cfg.patch.prefix = prefix;
            }
            cfg.patch.dir = p.dir;
            cfg.patch.search_roots = p.search_roots.unwrap_or_default();
            cfg.patch.on_failure = p.on_failure.unwrap_or_default();
            cfg.patch.detect_existing_files = p.detect_existing_files.unwrap_or(false);
            cfg.patch.verify_checksums = p.verify_checksums.unwrap_or(true);
            cfg.patch.skip = p.skip.unwrap_or(false);
        }
        if let Some(b) = self.build {
            if let Some(prefix) = b.prefix {
                cfg.build.prefix = prefix;
            }
            if let Some(jobs) = b.jobs {
                cfg.build.jobs = jobs.max(1);
            }
            if let Some(win64) = b.win64 {
                cfg.build.win64 = win64;
            }
            cfg.build.configure_args = b.configure_args.unwrap_or_default();
            cfg.build.build_dir = b.build_dir;
            cfg.build.toolchain = Toolchain {
                cc: b.cc,
                cxx: b.cxx,
                cflags: b.cflags,
                cxxflags: b.cxxflags,
                ldflags: b.ldflags,
            };
        }
        if let Some(d) = self.deps {
            cfg.deps.install = d.install.unwrap_or(false);
            cfg.deps.manager = d.manager;
            cfg.deps.assume_yes = d.assume_yes.unwrap_or(false);
        }
        if let Some(p) = self.package {
            if let Some(enabled) = p.enabled {
                cfg.package.enabled = enabled;
            }
            if let Some(dir) = p.output_dir {
                cfg.package.output_dir = dir;
            }
            if let Some(name) = p.name {
                cfg.package.name = name;
            }
        }
        cfg
    }
}

fn default_download_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".").join(".cache"))
        .join("wine-builder")
}

fn split_xdg_config_dirs() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_owned());
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn xdg_config_home() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".").join(".config"))
}

/// Config files consulted, lowest precedence first.
pub fn find_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for dir in split_xdg_config_dirs() {
        paths.push(dir.join("wine-builder").join(CONFIG_FILE_NAME));
    }
    paths.push(xdg_config_home().join("wine-builder").join(CONFIG_FILE_NAME));
    paths
}

fn read_toml(path: &Path) -> Result<ConfigToml, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    parse_toml(&text).map_err(|e| format!("Invalid TOML in {}: {e}", path.display()))
}

fn parse_toml(text: &str) -> Result<ConfigToml, toml::de::Error> {
    toml::from_str::<ConfigToml>(text)
}

/// Load configuration from the given files, in order. Missing files are
/// skipped; an `explicit` file must exist.
pub fn load_from(candidates: &[PathBuf], explicit: Option<&Path>) -> Result<BuildConfig, String> {
    let mut merged = ConfigToml::default();

    for path in candidates {
        if !path.exists() {
            continue;
        }
        merged.merge(read_toml(path)?);
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        merged.merge(read_toml(path)?);
    }

    Ok(merged.resolve())
}

/// Load configuration from the standard locations plus an optional explicit file.
pub fn load(explicit: Option<&Path>) -> Result<BuildConfig, String> {
    load_from(&find_config_files(), explicit)
}

/// Default patch search roots, in preference order:
/// next to the executable, under the current directory, next to the source tree.
pub fn default_search_roots(exe: Option<&Path>, cwd: &Path, source: Option<&Path>) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(dir) = exe.and_then(Path::parent) {
        roots.push(dir.join("patches"));
    }
    roots.push(cwd.join("patches"));
    if let Some(parent) = source.and_then(Path::parent) {
        roots.push(parent.join("patches"));
    }
    roots
}
