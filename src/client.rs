//! Client side: discovery, the per-file transfer session, and the outer
//! request loop
//!
//! Every logical exchange opens its own connection: one throwaway
//! connection for discovery at startup, then one connection per requested
//! file. The server greets every connection with its current listing, so
//! a transfer session drains the greeting before sending its filename.

use crate::log::TransferLog;
use crate::logger::Logger;
use crate::progress::DownloadProgress;
use crate::protocol::{self, BUFFER_UNIT, STATUS_NOT_FOUND, STATUS_OK};
use crate::requests;
use crate::scheduler::{self, TransferState};
use anyhow::Context;
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Read timeout applied to every blocking socket read, so a stalled peer
/// cannot wedge a session past its next stop-flag check.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server does not offer {0}")]
    NotFound(String),
    #[error("unexpected status line {0:?}")]
    Protocol(String),
    #[error("peer closed after {received} of {expected} bytes")]
    Partial { received: u64, expected: u64 },
    #[error("interrupted after {received} bytes")]
    Interrupted { received: u64 },
}

/// Connection parameters shared by every session in a round
#[derive(Debug, Clone)]
pub struct SessionOpts {
    pub addr: String,
    pub dest_dir: PathBuf,
    pub read_timeout: Duration,
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Fetch the server's listing over a throwaway connection.
///
/// Accumulates greeting lines until the blank-line terminator (or EOF),
/// so the listing size is bounded only by the stream.
pub fn fetch_listing(
    addr: &str,
    read_timeout: Duration,
) -> Result<HashMap<String, u64>, TransferError> {
    let stream = TcpStream::connect(addr).map_err(|source| TransferError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_read_timeout(Some(read_timeout))?;
    let mut reader = BufReader::new(stream);

    let mut listing = HashMap::new();
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 || line.trim_end_matches(['\r', '\n']).is_empty() {
            break;
        }
        if let Some((name, size)) = protocol::parse_listing_line(&line) {
            listing.insert(name, size);
        }
    }
    Ok(listing)
}

/// Read greeting lines until the blank-line terminator. Timed-out reads
/// re-check the stop flag; a partial line survives across retries because
/// read_line appends.
fn drain_greeting(
    reader: &mut BufReader<TcpStream>,
    state: &TransferState,
) -> Result<(), TransferError> {
    let mut line = String::new();
    loop {
        match reader.read_line(&mut line) {
            Ok(0) => {
                return Err(TransferError::Protocol(
                    "connection closed during greeting".to_string(),
                ))
            }
            Ok(_) => {
                if line.trim_end_matches(['\r', '\n']).is_empty() {
                    return Ok(());
                }
                line.clear();
            }
            Err(e) if is_timeout(&e) => {
                if state.is_stopped() {
                    return Err(TransferError::Interrupted { received: 0 });
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Read the one status line the server sends before any payload byte.
fn read_status_line(
    reader: &mut BufReader<TcpStream>,
    state: &TransferState,
) -> Result<String, TransferError> {
    let mut line = String::new();
    loop {
        match reader.read_line(&mut line) {
            Ok(0) => {
                return Err(TransferError::Protocol(
                    "connection closed before status line".to_string(),
                ))
            }
            Ok(_) => return Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if is_timeout(&e) => {
                if state.is_stopped() {
                    return Err(TransferError::Interrupted { received: 0 });
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// One transfer session: fetch `filename` over a fresh connection into
/// `dest_dir`, pacing reads by the priority weight.
///
/// The destination is truncated up front, so a re-attempt after an
/// earlier failure always starts from scratch. On success the shared
/// progress entry is pinned to 100 and the file joins the completed set;
/// on any failure the partial output is left in place and the file stays
/// eligible for the next round.
pub fn download_file(
    opts: &SessionOpts,
    filename: &str,
    expected: u64,
    weight: u64,
    state: &TransferState,
    bar: &ProgressBar,
) -> Result<u64, TransferError> {
    let stream = TcpStream::connect(&opts.addr).map_err(|source| TransferError::Connect {
        addr: opts.addr.clone(),
        source,
    })?;
    stream.set_read_timeout(Some(opts.read_timeout))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    drain_greeting(&mut reader, state)?;
    writer.write_all(filename.as_bytes())?;

    let status = read_status_line(&mut reader, state)?;
    if status == STATUS_NOT_FOUND {
        return Err(TransferError::NotFound(filename.to_string()));
    }
    if status != STATUS_OK {
        return Err(TransferError::Protocol(status));
    }

    let dest = opts.dest_dir.join(filename);
    let mut out = BufWriter::new(File::create(&dest)?);

    let chunk_cap = BUFFER_UNIT * weight as usize;
    let mut buf = vec![0u8; chunk_cap];
    let mut received: u64 = 0;
    state.set_progress(filename, 0.0);

    while received < expected {
        if state.is_stopped() {
            out.flush()?;
            return Err(TransferError::Interrupted { received });
        }
        let want = chunk_cap.min((expected - received) as usize);
        match reader.read(&mut buf[..want]) {
            Ok(0) => {
                out.flush()?;
                return Err(TransferError::Partial { received, expected });
            }
            Ok(n) => {
                out.write_all(&buf[..n])?;
                received += n as u64;
                state.set_progress(filename, received as f64 / expected as f64 * 100.0);
                bar.set_position(received);
                // Pacing knob only; the chunk sizing above is what makes
                // higher priorities finish sooner.
                thread::sleep(Duration::from_nanos(weight));
            }
            Err(e) if is_timeout(&e) => continue,
            Err(e) => {
                out.flush()?;
                return Err(e.into());
            }
        }
    }

    out.flush()?;
    state.set_progress(filename, 100.0);
    state.mark_completed(filename);
    Ok(received)
}

/// Options for the outer request loop
#[derive(Debug, Clone)]
pub struct ClientOpts {
    pub addr: String,
    pub input: PathBuf,
    pub dest_dir: PathBuf,
    pub interval: Duration,
    pub read_timeout: Duration,
    pub show_progress: bool,
    pub verbose: bool,
}

/// The client's outer control loop: discover once, then re-read the
/// request file, schedule a round, sleep, repeat until interrupted.
pub fn run(
    opts: &ClientOpts,
    state: Arc<TransferState>,
    logger: Arc<dyn Logger>,
    history: Option<TransferLog>,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(&opts.dest_dir)
        .with_context(|| format!("create output directory {}", opts.dest_dir.display()))?;

    // Discovery failure is not fatal: keep running with an empty listing
    // so a later restart of the daemon only costs the operator a client
    // restart, not a crash.
    let listing = match fetch_listing(&opts.addr, opts.read_timeout) {
        Ok(listing) => {
            logger.listing(&opts.addr, listing.len());
            listing
        }
        Err(e) => {
            eprintln!("discovery against {} failed: {}", opts.addr, e);
            logger.error("discovery", "", &e.to_string());
            HashMap::new()
        }
    };

    if !listing.is_empty() {
        println!("Available files on {}:", opts.addr);
        let mut entries: Vec<_> = listing.iter().collect();
        entries.sort();
        for (name, size) in entries {
            println!("  {} ({} bytes)", name, size);
        }
    }

    let session = SessionOpts {
        addr: opts.addr.clone(),
        dest_dir: opts.dest_dir.clone(),
        read_timeout: opts.read_timeout,
    };

    while !state.is_stopped() {
        let batch = match requests::read_request_file(&opts.input) {
            Ok(batch) => batch,
            Err(e) => {
                if opts.verbose {
                    eprintln!("{:#}", e);
                }
                Vec::new()
            }
        };

        if !batch.is_empty() {
            let progress = DownloadProgress::new(opts.show_progress);
            let stats = scheduler::run_round(
                &session,
                &listing,
                &batch,
                &state,
                &progress,
                &logger,
                history.as_ref(),
            );
            for err in &stats.errors {
                eprintln!("{}", err);
            }
            if opts.verbose && stats.launched > 0 {
                println!(
                    "round: {} launched, {} completed, {} failed, {} bytes",
                    stats.launched, stats.completed, stats.failed, stats.bytes_received
                );
            }
        }

        // Sliced sleep so an interrupt between rounds is honored promptly
        let mut waited = Duration::ZERO;
        while waited < opts.interval && !state.is_stopped() {
            let step = Duration::from_millis(100).min(opts.interval - waited);
            thread::sleep(step);
            waited += step;
        }
    }

    println!(
        "stopped; {} file(s) completed",
        state.completed_snapshot().len()
    );
    Ok(())
}
