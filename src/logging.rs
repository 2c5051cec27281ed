//! Log sink: a file that grows across runs plus a copy of every line on stderr.

use std::path::Path;

use flexi_logger::{DeferredNow, Duplicate, FileSpec, Logger, LoggerHandle};
use log::Record;

use crate::Result;

/// `2024-05-01 12:00:00 - INFO - message`
fn line_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> std::io::Result<()> {
    write!(
        w,
        "{} - {} - {}",
        now.now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.args()
    )
}

/// Starts logging at `level` (overridable through `RUST_LOG`).
/// Keep the returned handle alive for as long as the program logs.
pub fn init(level: &str, log_file: &Path) -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(level)?
        .log_to_file(FileSpec::try_from(log_file)?)
        .append()
        .duplicate_to_stderr(Duplicate::All)
        .format(line_format)
        .start()?;
    Ok(handle)
}
