//! Server address parsing for the ferry:// scheme

use crate::protocol::DEFAULT_PORT;

/// Parse an operator-supplied server address into host and port.
///
/// Accepts a bare host, `host:port`, or `ferry://host[:port]`. The port
/// falls back to the well-known default. Returns None for an empty host
/// or a foreign scheme.
pub fn parse_server_addr(input: &str) -> Option<(String, u16)> {
    let s = input.trim();
    let mut rest = s;
    if let Some(scheme_end) = s.find("://") {
        let scheme = s[..scheme_end].to_ascii_lowercase();
        if scheme != "ferry" {
            return None;
        }
        rest = &s[scheme_end + 3..];
    }
    // Strip any trailing path component
    let rest = rest.split('/').next().unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            Some((host.to_string(), port.parse().unwrap_or(DEFAULT_PORT)))
        }
        _ => Some((rest.to_string(), DEFAULT_PORT)),
    }
}

/// Convenience: the `host:port` connect string
pub fn connect_addr(input: &str) -> Option<String> {
    parse_server_addr(input).map(|(host, port)| format!("{}:{}", host, port))
}
