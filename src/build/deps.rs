//! Build dependency installation
//!
//! Detects the host package manager and installs the packages a Wine build
//! needs. Package lists are fixed per manager; resolution is left to the
//! package manager itself.

use nix::unistd::Uid;
use std::process::Command;

use crate::core::config::DepsConfig;
use crate::core::error::BuildError;
use crate::core::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
}

const APT_PACKAGES: &[&str] = &[
    "build-essential",
    "gcc-mingw-w64",
    "flex",
    "bison",
    "gettext",
    "libx11-dev",
    "libxext-dev",
    "libfreetype-dev",
    "libfontconfig-dev",
    "libgnutls28-dev",
    "libvulkan-dev",
    "libpulse-dev",
    "libgstreamer1.0-dev",
    "libgstreamer-plugins-base1.0-dev",
    "libsdl2-dev",
    "libudev-dev",
    "libwayland-dev",
    "libxkbcommon-dev",
];

const DNF_PACKAGES: &[&str] = &[
    "gcc",
    "make",
    "mingw64-gcc",
    "mingw32-gcc",
    "flex",
    "bison",
    "gettext-devel",
    "libX11-devel",
    "libXext-devel",
    "freetype-devel",
    "fontconfig-devel",
    "gnutls-devel",
    "vulkan-loader-devel",
    "pulseaudio-libs-devel",
    "gstreamer1-devel",
    "gstreamer1-plugins-base-devel",
    "SDL2-devel",
    "systemd-devel",
    "wayland-devel",
    "libxkbcommon-devel",
];

const PACMAN_PACKAGES: &[&str] = &[
    "base-devel",
    "mingw-w64-gcc",
    "flex",
    "bison",
    "gettext",
    "libx11",
    "libxext",
    "freetype2",
    "fontconfig",
    "gnutls",
    "vulkan-icd-loader",
    "libpulse",
    "gstreamer",
    "gst-plugins-base-libs",
    "sdl2",
    "systemd-libs",
    "wayland",
    "libxkbcommon",
];

impl PackageManager {
    /// Managers in detection order
    pub const ALL: [PackageManager; 3] = [Self::Apt, Self::Dnf, Self::Pacman];

    pub fn parse(name: &str) -> Result<Self, BuildError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "apt" | "apt-get" => Ok(Self::Apt),
            "dnf" => Ok(Self::Dnf),
            "pacman" => Ok(Self::Pacman),
            other => Err(BuildError::UnknownPackageManager(other.to_string())),
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
        }
    }

    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            Self::Apt => APT_PACKAGES,
            Self::Dnf => DNF_PACKAGES,
            Self::Pacman => PACMAN_PACKAGES,
        }
    }

    /// Full install command line, including `sudo` when needed
    pub fn install_command(&self, assume_yes: bool, use_sudo: bool) -> Vec<String> {
        let mut cmd = Vec::new();
        if use_sudo {
            cmd.push("sudo".to_string());
        }
        cmd.push(self.program().to_string());
        match self {
            Self::Apt | Self::Dnf => {
                cmd.push("install".to_string());
                if assume_yes {
                    cmd.push("-y".to_string());
                }
            }
            Self::Pacman => {
                cmd.push("-S".to_string());
                cmd.push("--needed".to_string());
                if assume_yes {
                    cmd.push("--noconfirm".to_string());
                }
            }
        }
        cmd.extend(self.packages().iter().map(|p| p.to_string()));
        cmd
    }
}

/// First manager whose program is on PATH
pub fn detect() -> Option<PackageManager> {
    PackageManager::ALL
        .into_iter()
        .find(|pm| which::which(pm.program()).is_ok())
}

fn is_root() -> bool {
    Uid::effective().is_root()
}

/// Install build dependencies per `cfg`.
pub fn install(cfg: &DepsConfig, dry_run: bool) -> Result<PackageManager, BuildError> {
    let manager = match &cfg.manager {
        Some(name) => PackageManager::parse(name)?,
        None => detect().ok_or(BuildError::NoPackageManager)?,
    };

    let cmd = manager.install_command(cfg.assume_yes, !is_root());
    let display = cmd.join(" ");
    output::sub_action(&format!(
        "installing {} packages with {}",
        manager.packages().len(),
        manager.program()
    ));

    if dry_run {
        output::detail(&format!("would run: {}", display));
        return Ok(manager);
    }

    let status = Command::new(&cmd[0]).args(&cmd[1..]).status()?;
    if !status.success() {
        return Err(BuildError::CommandFailed {
            cmd: display,
            code: status.code(),
        });
    }

    output::detail(&format!("dependencies installed via {}", manager.program()));
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(PackageManager::parse("APT").unwrap(), PackageManager::Apt);
        assert_eq!(PackageManager::parse("apt-get").unwrap(), PackageManager::Apt);
        assert_eq!(PackageManager::parse("pacman").unwrap(), PackageManager::Pacman);
        assert!(matches!(
            PackageManager::parse("zypper"),
            Err(BuildError::UnknownPackageManager(_))
        ));
    }

    #[test]
    fn test_apt_command() {
        let cmd = PackageManager::Apt.install_command(true, true);
        assert_eq!(&cmd[..4], &["sudo", "apt-get", "install", "-y"]);
        assert!(cmd.contains(&"gcc-mingw-w64".to_string()));
    }

    #[test]
    fn test_pacman_command_without_sudo() {
        let cmd = PackageManager::Pacman.install_command(false, false);
        assert_eq!(&cmd[..3], &["pacman", "-S", "--needed"]);
        assert!(!cmd.contains(&"--noconfirm".to_string()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_root_check_matches_effective_uid() {
        // Uid: real effective saved fs
        let status = std::fs::read_to_string("/proc/self/status").unwrap();
        let euid: u32 = status
            .lines()
            .find_map(|l| l.strip_prefix("Uid:"))
            .and_then(|ids| ids.split_whitespace().nth(1))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(is_root(), euid == 0);

        let cmd = PackageManager::Dnf.install_command(true, !is_root());
        assert_eq!(cmd[0] == "sudo", euid != 0);
    }

    #[test]
    fn test_every_manager_has_packages() {
        for pm in PackageManager::ALL {
            assert!(!pm.packages().is_empty());
        }
    }

    #[test]
    fn test_dry_run_with_forced_manager() {
        let cfg = DepsConfig {
            install: true,
            manager: Some("dnf".into()),
            assume_yes: true,
        };
        assert_eq!(install(&cfg, true).unwrap(), PackageManager::Dnf);
    }
}
