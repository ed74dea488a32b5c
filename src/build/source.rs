//! Source acquisition
//!
//! Produces the source tree the patch step works on: an existing directory,
//! a local archive, an archive URL, or a release number resolved against
//! dl.winehq.org. Archives are unpacked natively (no external tar).

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::core::config::SourceConfig;
use crate::core::error::BuildError;
use crate::core::output;
use crate::core::version::Version;

/// Release tarball host
pub const WINEHQ_SOURCE_BASE: &str = "https://dl.winehq.org/wine/source";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarBz2,
    TarZst,
    Tar,
}

/// Detect archive format from filename extension
pub fn detect_format(name: &str) -> Option<ArchiveFormat> {
    let name = name.to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(ArchiveFormat::TarXz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some(ArchiveFormat::TarBz2)
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        Some(ArchiveFormat::TarZst)
    } else if name.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Release series directory on dl.winehq.org: `10.x` from 2.0 on, `1.7` before.
pub fn release_series(version: &Version) -> String {
    if version.major() >= 2 {
        format!("{}.x", version.major())
    } else {
        format!("{}.{}", version.major(), version.minor())
    }
}

/// Download URL of a release tarball.
pub fn release_url(version: &str) -> Result<String, BuildError> {
    let parsed: Version = version
        .parse()
        .map_err(|_| BuildError::InvalidVersion(version.to_string()))?;
    Ok(format!(
        "{}/{}/wine-{}.tar.xz",
        WINEHQ_SOURCE_BASE,
        release_series(&parsed),
        version
    ))
}

/// Materialize the source tree described by `cfg`. Returns its root.
pub fn acquire(cfg: &SourceConfig, dry_run: bool) -> Result<PathBuf, BuildError> {
    if let Some(path) = &cfg.dir {
        if path.is_dir() {
            output::detail(&format!("using source tree {}", path.display()));
            return Ok(path.clone());
        }
        if path.is_file() {
            return unpack(path, &cfg.download_dir, dry_run);
        }
        return Err(BuildError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source not found: {}", path.display()),
        )));
    }

    let url = match (&cfg.url, &cfg.version) {
        (Some(url), _) => url.clone(),
        (None, Some(version)) => release_url(version)?,
        (None, None) => {
            return Err(BuildError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "no source given: set a directory, archive, URL or version",
            )));
        }
    };

    let archive = cfg.download_dir.join(url_filename(&url));
    if dry_run {
        output::detail(&format!("would download {}", url));
        return Ok(cfg.download_dir.join(strip_archive_ext(&url_filename(&url))));
    }
    if archive.exists() {
        output::skip(&format!("{} already downloaded", archive.display()));
    } else {
        download(&url, &archive)?;
    }
    unpack(&archive, &cfg.download_dir, dry_run)
}

fn unpack(archive: &Path, dest: &Path, dry_run: bool) -> Result<PathBuf, BuildError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if dry_run {
        output::detail(&format!("would extract {}", archive.display()));
        return Ok(dest.join(strip_archive_ext(&name)));
    }
    let top = extract(archive, dest)?;
    Ok(dest.join(top))
}

/// Last path segment of a URL, without query or fragment
pub fn url_filename(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("source.tar.xz")
        .to_string()
}

fn strip_archive_ext(name: &str) -> String {
    for ext in [".tar.gz", ".tar.xz", ".tar.bz2", ".tar.zst", ".tgz", ".txz", ".tbz2", ".tzst", ".tar"] {
        if let Some(stem) = name.strip_suffix(ext) {
            return stem.to_string();
        }
    }
    name.to_string()
}

/// Download `url` to `dest` behind a spinner.
pub fn download(url: &str, dest: &Path) -> Result<u64, BuildError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let filename = url_filename(url);
    let pb = output::spinner(&format!("downloading {}", filename));

    let fail = |reason: String| BuildError::Download {
        url: url.to_string(),
        reason,
    };

    let response = match ureq::get(url).call() {
        Ok(r) => r,
        Err(e) => {
            output::progress_done(pb);
            return Err(fail(e.to_string()));
        }
    };

    if let Some(len) = response
        .header("content-length")
        .and_then(|s| s.parse().ok())
    {
        output::upgrade_to_bytes(&pb, len);
    }

    // Write to a partial file so an interrupted download is never mistaken
    // for a complete archive.
    let partial = dest.with_extension("part");
    let mut file = File::create(&partial)?;
    let mut reader = response.into_reader();
    let mut buffer = [0u8; 8192];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) => {
                output::progress_done(pb);
                let _ = std::fs::remove_file(&partial);
                return Err(fail(e.to_string()));
            }
        };
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])?;
        total += n as u64;
        pb.set_position(total);
    }
    drop(file);
    std::fs::rename(&partial, dest)?;

    output::progress_done(pb);
    output::detail(&format!("downloaded {} ({} bytes)", filename, total));
    Ok(total)
}

// ============================================================================
// Native archive extraction
// ============================================================================

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

fn ensure_no_symlink_components(dest: &Path, full_path: &Path) -> Result<(), BuildError> {
    let rel = full_path
        .strip_prefix(dest)
        .map_err(|_| BuildError::UnsafePath(full_path.to_path_buf()))?;

    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(BuildError::UnsafePath(cur));
        }
    }
    Ok(())
}

fn ensure_link_target_within_dest(
    dest: &Path,
    link_parent: &Path,
    link_name: &Path,
) -> Result<(), BuildError> {
    if link_name.is_absolute() {
        return Err(BuildError::UnsafePath(link_name.to_path_buf()));
    }
    let candidate = normalize_lexical(&link_parent.join(link_name));
    if candidate.strip_prefix(normalize_lexical(dest)).is_err() {
        return Err(BuildError::UnsafePath(link_name.to_path_buf()));
    }
    Ok(())
}

/// Unpack a tar stream into `dest`. Returns the top-level entry names seen.
fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<Vec<String>, BuildError> {
    let mut archive = tar::Archive::new(reader);
    let mut tops: Vec<String> = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(BuildError::UnsafePath(path));
        }
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        if let Some(Component::Normal(first)) =
            path.components().find(|c| !matches!(c, Component::CurDir))
        {
            let first = first.to_string_lossy().to_string();
            if !tops.contains(&first) {
                tops.push(first);
            }
        }

        let full_path = dest.join(&path);
        ensure_no_symlink_components(dest, &full_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type == tar::EntryType::Symlink || entry_type == tar::EntryType::Link {
            let link_name = entry
                .link_name()?
                .ok_or_else(|| BuildError::UnsafePath(path.clone()))?;
            // Hard links resolve from the archive root, symlinks from their parent
            let base = if entry_type == tar::EntryType::Link {
                dest.to_path_buf()
            } else {
                full_path.parent().unwrap_or(dest).to_path_buf()
            };
            ensure_link_target_within_dest(dest, &base, &link_name)?;
        }

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&full_path)?;
    }

    Ok(tops)
}

/// Extract `archive` into `dest` and return the name of its single
/// top-level directory.
pub fn extract(archive: &Path, dest: &Path) -> Result<String, BuildError> {
    let name = archive
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    let format = detect_format(&name).ok_or_else(|| BuildError::UnsupportedFormat(name.clone()))?;

    std::fs::create_dir_all(dest)?;
    let reader = BufReader::new(File::open(archive)?);

    let pb = output::spinner(&format!("extracting {}", name));
    let result = match format {
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(reader), dest),
        ArchiveFormat::TarZst => {
            zstd::stream::read::Decoder::new(reader)
                .map_err(BuildError::Io)
                .and_then(|d| extract_tar(d, dest))
        }
        ArchiveFormat::Tar => extract_tar(reader, dest),
    };
    output::progress_done(pb);

    let tops = result?;
    match tops.as_slice() {
        [top] if dest.join(top).is_dir() => {
            output::detail(&format!("extracted {} to {}", name, dest.display()));
            Ok(top.clone())
        }
        _ => Err(BuildError::NoTopLevelDir(archive.to_path_buf())),
    }
}
