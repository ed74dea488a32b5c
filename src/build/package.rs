//! Packaging of the installed tree
//!
//! The `make install` staging directory becomes
//! `<output_dir>/<name>-<version>-<arch>.tar.xz`. Entries are appended in
//! sorted path order with zeroed owner and mtime, so the same staging tree
//! always packs to the same archive.

use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tar::Builder as TarBuilder;
use walkdir::WalkDir;
use xz2::write::XzEncoder;

use crate::core::config::PackageConfig;
use crate::core::error::BuildError;
use crate::core::output;

/// xz preset used for release archives
const XZ_LEVEL: u32 = 6;

/// `<name>-<version>-<arch>.tar.xz`
pub fn archive_name(name: &str, version: &str, arch: &str) -> String {
    format!("{}-{}-{}.tar.xz", name, version, arch)
}

/// Pack `staging` according to `cfg`. Returns the archive path.
pub fn package(
    staging: &Path,
    cfg: &PackageConfig,
    version: &str,
    dry_run: bool,
) -> Result<PathBuf, BuildError> {
    let out = cfg
        .output_dir
        .join(archive_name(&cfg.name, version, std::env::consts::ARCH));

    if dry_run {
        output::detail(&format!("would package {} into {}", staging.display(), out.display()));
        return Ok(out);
    }
    if !staging.is_dir() {
        return Err(BuildError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("staging directory not found: {}", staging.display()),
        )));
    }

    fs::create_dir_all(&cfg.output_dir)?;
    let pb = output::spinner(&format!("packaging {}", out.display()));
    let count = create_tar_xz(staging, &out);
    output::progress_done(pb);
    let count = count?;

    output::success(&format!("packaged {} entries into {}", count, out.display()));
    Ok(out)
}

fn sorted_entries(src_dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = WalkDir::new(src_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .filter(|p| p != src_dir)
        .collect();
    entries.sort_by(|a, b| {
        let ra = a.strip_prefix(src_dir).unwrap_or(a);
        let rb = b.strip_prefix(src_dir).unwrap_or(b);
        ra.cmp(rb)
    });
    entries
}

fn header_for(md: &fs::Metadata, kind: tar::EntryType, size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(md.permissions().mode());
    header
}

/// Write `src_dir` as a tar.xz at `out_path`. Returns the number of entries.
pub fn create_tar_xz(src_dir: &Path, out_path: &Path) -> Result<usize, BuildError> {
    let out = File::create(out_path)?;
    let mut builder = TarBuilder::new(XzEncoder::new(out, XZ_LEVEL));
    let mut count = 0;

    for path in sorted_entries(src_dir) {
        let rel = path.strip_prefix(src_dir).unwrap_or(&path).to_path_buf();
        let md = fs::symlink_metadata(&path)?;

        if md.file_type().is_symlink() {
            let target = fs::read_link(&path)?;
            let mut header = header_for(&md, tar::EntryType::Symlink, 0);
            header.set_link_name(&target)?;
            header.set_cksum();
            builder.append_data(&mut header, &rel, std::io::empty())?;
        } else if md.is_dir() {
            let mut header = header_for(&md, tar::EntryType::Directory, 0);
            header.set_cksum();
            builder.append_data(&mut header, &rel, std::io::empty())?;
        } else if md.is_file() {
            let mut header = header_for(&md, tar::EntryType::Regular, md.len());
            header.set_cksum();
            builder.append_data(&mut header, &rel, File::open(&path)?)?;
        } else {
            continue;
        }
        count += 1;
    }

    builder.into_inner()?.finish()?;
    Ok(count)
}
