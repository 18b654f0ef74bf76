//! Shared wire constants and the listing codec for the ferry transport
//!
//! Every exchange rides its own TCP connection. The server greets each
//! connection with a listing message, then serves raw file payloads on
//! request:
//!
//! - Listing message: one `name:size` record per line, terminated by a
//!   single blank line. Streamed, so the listing is not capped by any
//!   receive buffer.
//! - Filename request: one text message containing exactly the filename,
//!   no trailing delimiter.
//! - Status line: `OK` or `ERR not-found`, newline-terminated, sent by
//!   the server before any payload byte. The client checks it before
//!   entering its copy loop.
//! - File payload: raw bytes, no framing; the client stops at the size
//!   advertised in the listing.

use crate::fs_enum::FileEntry;
use std::collections::HashMap;

/// Well-known server port
pub const DEFAULT_PORT: u16 = 65432;

/// Base unit for chunked reads/writes; a client session reads chunks of
/// BUFFER_UNIT * priority weight
pub const BUFFER_UNIT: usize = 1024;

/// Status line preceding a file payload
pub const STATUS_OK: &str = "OK";
/// Status line for a filename absent from the greeting-time listing
pub const STATUS_NOT_FOUND: &str = "ERR not-found";

/// Encode a listing as `name:size` records, one per line.
///
/// Entries with an empty name are skipped. The blank-line terminator is
/// transport framing, not part of the encoded form.
pub fn encode_listing(entries: &[FileEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        if entry.name.is_empty() {
            continue;
        }
        out.push_str(&entry.name);
        out.push(':');
        out.push_str(&entry.size.to_string());
        out.push('\n');
    }
    out
}

/// Parse one listing record. Splits on the first `:`; returns None for
/// blank lines, colon-less lines, and unparsable sizes.
pub fn parse_listing_line(line: &str) -> Option<(String, u64)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }
    let (name, size) = line.split_once(':')?;
    let size = size.parse::<u64>().ok()?;
    Some((name.to_string(), size))
}

/// Decode a listing message into a name -> size map. Malformed lines are
/// dropped; if a name repeats, the last occurrence wins.
pub fn decode_listing(text: &str) -> HashMap<String, u64> {
    text.lines().filter_map(parse_listing_line).collect()
}
