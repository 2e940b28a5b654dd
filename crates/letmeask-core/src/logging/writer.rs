//! Append-only JSONL file writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::JsonLogEntry;

/// Appends log entries to `{logs_dir}/{date}_{session}.jsonl`.
pub struct SessionLogWriter {
    session: String,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionLogWriter {
    /// Open (or create) today's log file for `session`, creating `logs_dir`
    /// if needed.
    pub fn new(logs_dir: impl AsRef<Path>, session: impl Into<String>) -> std::io::Result<Self> {
        let session = session.into();
        let logs_dir = logs_dir.as_ref();
        fs::create_dir_all(logs_dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = logs_dir.join(format!("{}_{}.jsonl", date, session));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            session,
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry as a single line and flush it.
    pub fn write(&self, entry: &JsonLogEntry) -> std::io::Result<()> {
        let json = entry
            .to_json_line()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}

impl Drop for SessionLogWriter {
    fn drop(&mut self) {
        let _ = self.writer.lock().flush();
    }
}

/// Read every entry of a log file, skipping lines that do not parse.
pub fn read_entries(path: impl AsRef<Path>) -> std::io::Result<Vec<JsonLogEntry>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| JsonLogEntry::from_json_line(line).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_appends_lines() {
        let temp = TempDir::new().unwrap();
        let writer = SessionLogWriter::new(temp.path().join("logs"), "cli").unwrap();

        assert!(writer
            .path()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("_cli.jsonl"));

        writer
            .write(&JsonLogEntry::new("info", "cli", "test", "first"))
            .unwrap();
        writer
            .write(&JsonLogEntry::new("info", "cli", "test", "second"))
            .unwrap();

        let entries = read_entries(writer.path()).unwrap();
        let messages: Vec<_> = entries.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn test_read_entries_skips_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mixed.jsonl");
        let good = JsonLogEntry::new("info", "cli", "test", "ok").to_json_line().unwrap();
        fs::write(&path, format!("{}\nnot json\n\n", good)).unwrap();

        assert_eq!(read_entries(&path).unwrap().len(), 1);
    }
}
