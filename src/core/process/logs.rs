// ─── Rolling Process Log ───
// Captured stdout/stderr is appended to `logs/live.log` inside the instance
// directory. The file is trimmed to a bounded tail at each launch so a
// reloaded UI can re-attach without the file growing forever.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

const LOG_FILE: &str = "live.log";
/// Trim threshold: once past this many lines the file is cut back.
const MAX_LINES: usize = 20_000;
/// Lines kept after a trim.
const TAIL_KEEP: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RollingLog {
    path: PathBuf,
}

impl RollingLog {
    pub fn new(logs_dir: &Path) -> Self {
        Self {
            path: logs_dir.join(LOG_FILE),
        }
    }

    /// Called before a new process starts: bound the carried-over history.
    pub fn trim_for_launch(&self) -> LauncherResult<()> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Ok(());
        };

        let line_count = content.lines().count();
        if line_count <= MAX_LINES {
            return Ok(());
        }

        let tail: Vec<&str> = content
            .lines()
            .skip(line_count - TAIL_KEEP)
            .collect();
        std::fs::write(&self.path, tail.join("\n") + "\n").map_err(|source| {
            LauncherError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Open the log for appending. One writer per process lifetime.
    pub fn open_writer(&self) -> LauncherResult<std::io::BufWriter<std::fs::File>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| LauncherError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(std::io::BufWriter::new(file))
    }

    pub fn append_line(writer: &mut std::io::BufWriter<std::fs::File>, line: &str) {
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }

    /// Last `max_lines` from disk — the re-attachment path after a UI
    /// reload, independent of the live event stream.
    pub fn read_tail(&self, max_lines: usize) -> LauncherResult<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LauncherError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let start = lines.len().saturating_sub(max_lines);
        Ok(lines[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tail_returns_bounded_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let log = RollingLog::new(tmp.path());

        let mut writer = log.open_writer().unwrap();
        for i in 0..50 {
            RollingLog::append_line(&mut writer, &format!("line {}", i));
        }
        drop(writer);

        let tail = log.read_tail(10).unwrap();
        assert_eq!(tail.len(), 10);
        assert_eq!(tail[0], "line 40");
        assert_eq!(tail[9], "line 49");

        // Missing file reads as empty, not an error.
        let empty = RollingLog::new(&tmp.path().join("nope"));
        assert!(empty.read_tail(10).unwrap().is_empty());
    }
}
