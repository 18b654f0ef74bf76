//! Server side: listener fan-out and the per-connection transfer session
//!
//! Each accepted connection gets its own thread and its own fresh
//! listing, taken at greeting time. There is no session cap and no
//! affinity across connections; a client fetching five files opens five
//! connections and is greeted five times.

use crate::fs_enum;
use crate::protocol::{self, BUFFER_UNIT, STATUS_NOT_FOUND, STATUS_OK};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::thread;

pub fn serve(bind: &str, root: &Path) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("bind {}", bind))?;
    serve_on(listener, root)
}

/// Accept loop on an already-bound listener. Split out so tests can bind
/// an ephemeral port themselves.
pub fn serve_on(listener: TcpListener, root: &Path) -> Result<()> {
    eprintln!(
        "ferryd listening on {} root={}",
        listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        root.display()
    );
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                eprintln!("conn from {}", peer);
                let root = root.to_path_buf();
                thread::spawn(move || {
                    if let Err(e) = handle_conn(stream, &root) {
                        eprintln!("session {} ended: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                eprintln!("accept error: {}", e);
            }
        }
    }
    Ok(())
}

/// One connection's state machine: greet with a fresh listing, then serve
/// filename requests until the peer closes or streaming fails.
fn handle_conn(mut stream: TcpStream, root: &Path) -> Result<()> {
    let listing = fs_enum::enumerate_directory(root)?;

    // Greeting: listing records plus the blank-line terminator
    let mut greeting = protocol::encode_listing(&listing);
    greeting.push('\n');
    stream.write_all(greeting.as_bytes())?;

    // Requests are checked against the listing taken at greeting time;
    // files appearing later are offered on the next connection.
    let offered: HashSet<&str> = listing.iter().map(|e| e.name.as_str()).collect();

    let mut buf = [0u8; BUFFER_UNIT];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let requested = std::str::from_utf8(&buf[..n]).context("request was not utf-8")?;

        if !offered.contains(requested) {
            stream.write_all(STATUS_NOT_FOUND.as_bytes())?;
            stream.write_all(b"\n")?;
            continue;
        }

        stream.write_all(STATUS_OK.as_bytes())?;
        stream.write_all(b"\n")?;
        if let Err(e) = send_file(&mut stream, &root.join(requested)) {
            eprintln!("streaming {} failed: {}", requested, e);
            break;
        }
    }
    Ok(())
}

fn send_file(stream: &mut TcpStream, path: &Path) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = vec![0u8; BUFFER_UNIT];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n])?;
    }
    Ok(())
}
