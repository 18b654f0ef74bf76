use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn listing(&self, _addr: &str, _count: usize) {}
    fn session_start(&self, _file: &str, _size: u64, _weight: u64) {}
    fn session_done(&self, _file: &str, _bytes: u64, _seconds: f64) {}
    fn error(&self, _context: &str, _file: &str, _msg: &str) {}
    fn round_done(&self, _launched: usize, _completed: usize, _failed: usize) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn listing(&self, addr: &str, count: usize) {
        self.line(&format!("LISTING addr={} files={}", addr, count));
    }
    fn session_start(&self, file: &str, size: u64, weight: u64) {
        self.line(&format!("START file={} size={} weight={}", file, size, weight));
    }
    fn session_done(&self, file: &str, bytes: u64, seconds: f64) {
        self.line(&format!("DONE file={} bytes={} seconds={:.3}", file, bytes, seconds));
    }
    fn error(&self, context: &str, file: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} file={} msg={}", context, file, msg));
    }
    fn round_done(&self, launched: usize, completed: usize, failed: usize) {
        self.line(&format!(
            "ROUND launched={launched} completed={completed} failed={failed}"
        ));
    }
}
