use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};
use std::fs::{OpenOptions, File};
use std::io::{BufReader, BufWriter, Write, BufRead};
use anyhow::{Result, Context};
use chrono::Utc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Interrupted,
    Failed,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub file: String,
    pub priority: String,
    pub expected_bytes: u64,
    pub bytes_transferred: u64,
    pub status: TransferStatus,
    pub error: Option<String>,
}

impl TransferLogEntry {
    pub fn now(
        file: &str,
        priority: &str,
        expected_bytes: u64,
        bytes_transferred: u64,
        status: TransferStatus,
        error: Option<String>,
    ) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            file: file.to_string(),
            priority: priority.to_string(),
            expected_bytes,
            bytes_transferred,
            status,
            error,
        }
    }
}

/// Append-only JSONL history of finished transfer sessions
pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TransferLog {
            log_file_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn add_entry(&self, entry: &TransferLogEntry) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer history file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer history file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_round_trip_through_jsonl() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = TransferLog::new(dir.path().join("history.jsonl"));

        log.add_entry(&TransferLogEntry::now(
            "a.bin",
            "HIGH",
            1000,
            1000,
            TransferStatus::Completed,
            None,
        ))?;
        log.add_entry(&TransferLogEntry::now(
            "b.bin",
            "NORMAL",
            2000,
            400,
            TransferStatus::Failed,
            Some("connection reset".to_string()),
        ))?;

        let entries = log.read_log()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file, "a.bin");
        assert_eq!(entries[0].status, TransferStatus::Completed);
        assert_eq!(entries[1].bytes_transferred, 400);
        assert_eq!(entries[1].status, TransferStatus::Failed);
        Ok(())
    }

    #[test]
    fn missing_history_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransferLog::new(dir.path().join("nope.jsonl"));
        assert!(log.read_log().unwrap().is_empty());
    }
}
