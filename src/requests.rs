//! Request-source provider: the editable desired-file list
//!
//! The file is re-read at the top of every round, so the operator can add
//! or reprioritize downloads between rounds without restarting the client.

use crate::priority::{parse_request_line, DownloadRequest};
use anyhow::{Context, Result};
use std::path::Path;

/// Read the request file: one `filename [priority]` per line, blank lines
/// skipped. A missing file is an error; the request loop treats it as an
/// empty batch and keeps running.
pub fn read_request_file(path: &Path) -> Result<Vec<DownloadRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read request file {}", path.display()))?;
    Ok(text.lines().filter_map(parse_request_line).collect())
}
