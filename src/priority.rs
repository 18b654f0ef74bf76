//! Priority labels and the fixed pacing-weight table

use std::fmt;

/// Transfer priority. The weight paces a session's chunk size: higher
/// priority reads larger chunks per receive and finishes sooner under
/// concurrent load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Critical,
    High,
    Normal,
}

impl Priority {
    /// Pacing multiplier: CRITICAL=10, HIGH=4, NORMAL=1
    pub fn weight(self) -> u64 {
        match self {
            Priority::Critical => 10,
            Priority::High => 4,
            Priority::Normal => 1,
        }
    }

    /// Parse a label, case-insensitively. Unrecognized labels degrade to
    /// Normal (weight 1) rather than failing the request line.
    pub fn parse(label: &str) -> Priority {
        match label.to_ascii_uppercase().as_str() {
            "CRITICAL" => Priority::Critical,
            "HIGH" => Priority::High,
            _ => Priority::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Normal => "NORMAL",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested download, held only for the current scheduling round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub filename: String,
    pub priority: Priority,
}

/// Parse one request line: `filename [priority]`, split on the last
/// space. Blank lines yield None.
pub fn parse_request_line(line: &str) -> Option<DownloadRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.rsplit_once(' ') {
        Some((filename, label)) if !filename.is_empty() => Some(DownloadRequest {
            filename: filename.trim_end().to_string(),
            priority: Priority::parse(label),
        }),
        _ => Some(DownloadRequest {
            filename: line.to_string(),
            priority: Priority::Normal,
        }),
    }
}
