//! Build log filtering
//!
//! configure and make output is kept in full in `build.log`; only the lines
//! worth a human's attention are echoed back after each step.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Most notable lines shown per step
pub const MAX_SHOWN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Error,
    Warning,
    Notice,
    Noise,
}

/// Classify one line of configure/make output.
pub fn classify(line: &str) -> LineKind {
    let l = line.trim_start();
    if l.starts_with("configure: error") || l.contains("error:") || l.contains("*** ") || l.starts_with("Error ") {
        return LineKind::Error;
    }
    if l.starts_with("configure: WARNING") || l.contains("warning:") {
        return LineKind::Warning;
    }
    if l.starts_with("configure: ") {
        return LineKind::Notice;
    }
    LineKind::Noise
}

/// Notable lines and counts for one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub errors: usize,
    pub warnings: usize,
    /// Errors first, then warnings and notices; capped at [`MAX_SHOWN`]
    pub shown: Vec<String>,
}

/// Summarize `text`.
pub fn summarize<'a>(lines: impl IntoIterator<Item = &'a str>) -> LogSummary {
    let mut summary = LogSummary::default();
    let mut errors = Vec::new();
    let mut others = Vec::new();

    for line in lines {
        match classify(line) {
            LineKind::Error => {
                summary.errors += 1;
                errors.push(line.trim_end().to_string());
            }
            LineKind::Warning => {
                summary.warnings += 1;
                others.push(line.trim_end().to_string());
            }
            LineKind::Notice => others.push(line.trim_end().to_string()),
            LineKind::Noise => {}
        }
    }

    summary.shown = errors.into_iter().chain(others).take(MAX_SHOWN).collect();
    summary
}

/// Summarize the part of a log file starting at byte `offset`.
pub fn summarize_file(path: &Path, offset: u64) -> std::io::Result<LogSummary> {
    use std::io::{Seek, SeekFrom};

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let lines: Vec<String> = BufReader::new(file)
        .split(b'\n')
        .filter_map(Result::ok)
        .map(|raw| String::from_utf8_lossy(&raw).to_string())
        .collect();
    Ok(summarize(lines.iter().map(String::as_str)))
}
