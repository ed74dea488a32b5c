//! Colored console output and spinners
//!
//! Uses owo-colors for terminal colors and indicatif for progress spinners.
//! Warnings and errors go to stderr, everything else to stdout.
//! [`set_quiet`] silences the stdout half so machine-readable output owns it.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static QUIET: AtomicBool = AtomicBool::new(false);

/// Suppress every stdout status line (warnings and errors still print).
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const TICK_INTERVAL_MS: u64 = 80;

/// Print an action header (blue, bold)
/// Example: "==> Applying patches for wine-10.4"
pub fn action(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a step with counter
/// Example: "(2/6) configure"
pub fn action_numbered(current: usize, total: usize, message: &str) {
    if quiet() {
        return;
    }
    println!(
        "{} {}",
        format!("({}/{})", current, total).cyan(),
        message.bold()
    );
}

/// Print a sub-action (cyan arrow)
/// Example: "  -> 0001-fix-build.patch"
pub fn sub_action(message: &str) {
    if quiet() {
        return;
    }
    println!("  {} {}", "->".cyan(), message);
}

/// Print a detail line (dimmed)
pub fn detail(message: &str) {
    if quiet() {
        return;
    }
    println!("     {}", message.dimmed());
}

/// Print a success message (green)
pub fn success(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print an info message (cyan)
pub fn info(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "::".cyan(), message);
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print a skip message (dimmed)
pub fn skip(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "==>".dimmed(), message.dimmed());
}

/// Print a patch status line, colored by outcome
///
/// `ok` selects green, `false` selects red, `None` dims the label.
pub fn patch_status(name: &str, label: &str, ok: Option<bool>) {
    if quiet() {
        return;
    }
    match ok {
        Some(true) => println!("  {} {} [{}]", "->".cyan(), name, label.green()),
        Some(false) => println!("  {} {} [{}]", "->".cyan(), name, label.red().bold()),
        None => println!("  {} {} [{}]", "->".cyan(), name, label.dimmed()),
    }
}

/// Create a spinner for long-running steps (download, extract, make)
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // The template is a constant; fall back to the default style rather than panic.
    let style = ProgressStyle::default_spinner()
        .template("     {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

/// Turn a spinner into a byte counter once the content length is known
pub fn upgrade_to_bytes(pb: &ProgressBar, total_bytes: u64) {
    pb.set_length(total_bytes);
    let style = ProgressStyle::default_bar()
        .template("     {spinner:.cyan} [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━");
    pb.set_style(style);
}

/// Finish a progress bar and clear it
pub fn progress_done(pb: ProgressBar) {
    pb.finish_and_clear();
}
