//! Priority scheduling: shared transfer state and the per-round fan-out
//!
//! Each round spawns one OS thread per eligible request, with no
//! concurrency cap beyond the batch size itself, and joins them all
//! before returning. The join is the only synchronization point between
//! rounds.

use crate::client::{self, SessionOpts, TransferError};
use crate::log::{TransferLog, TransferLogEntry, TransferStatus};
use crate::logger::Logger;
use crate::priority::DownloadRequest;
use crate::progress::DownloadProgress;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

/// State shared by every concurrently running session: per-file progress
/// percentages, the set of finished files, and the process-wide stop
/// flag. Sessions write, the outer loop reads; both sides go through the
/// locks.
pub struct TransferState {
    progress: Mutex<HashMap<String, f64>>,
    completed: Mutex<HashSet<String>>,
    stop: AtomicBool,
}

impl TransferState {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashSet::new()),
            stop: AtomicBool::new(false),
        }
    }

    pub fn set_progress(&self, file: &str, pct: f64) {
        self.progress.lock().insert(file.to_string(), pct);
    }

    pub fn progress_of(&self, file: &str) -> Option<f64> {
        self.progress.lock().get(file).copied()
    }

    pub fn progress_snapshot(&self) -> HashMap<String, f64> {
        self.progress.lock().clone()
    }

    /// Insert-only; a completed file is never re-attempted.
    pub fn mark_completed(&self, file: &str) {
        self.completed.lock().insert(file.to_string());
    }

    pub fn is_completed(&self, file: &str) -> bool {
        self.completed.lock().contains(file)
    }

    pub fn completed_snapshot(&self) -> HashSet<String> {
        self.completed.lock().clone()
    }

    /// Set once, on interrupt. Observed cooperatively at chunk boundaries
    /// and before each round; never forces a blocked call to abort.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome tallies for one scheduling round
#[derive(Debug, Default)]
pub struct RoundStats {
    pub launched: usize,
    pub completed: usize,
    pub failed: usize,
    pub interrupted: usize,
    pub bytes_received: u64,
    pub errors: Vec<String>,
}

impl RoundStats {
    fn add_completed(&mut self, bytes: u64) {
        self.completed += 1;
        self.bytes_received += bytes;
    }

    fn add_error(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
    }
}

/// The requests a round will actually launch: present in the listing,
/// not yet completed, first occurrence per filename.
pub fn eligible_requests<'a>(
    listing: &HashMap<String, u64>,
    requests: &'a [DownloadRequest],
    state: &TransferState,
) -> Vec<(&'a DownloadRequest, u64)> {
    let mut seen = HashSet::new();
    requests
        .iter()
        .filter(|r| seen.insert(r.filename.as_str()))
        .filter(|r| !state.is_completed(&r.filename))
        .filter_map(|r| listing.get(&r.filename).map(|size| (r, *size)))
        .collect()
}

struct SessionReport {
    filename: String,
    priority: &'static str,
    expected: u64,
    result: Result<u64, TransferError>,
}

/// Run one scheduling round: spawn a session per eligible request and
/// wait for every one of them, success or failure, before returning.
/// Session failures are tallied and logged, never propagated.
pub fn run_round(
    opts: &SessionOpts,
    listing: &HashMap<String, u64>,
    requests: &[DownloadRequest],
    state: &Arc<TransferState>,
    progress: &DownloadProgress,
    logger: &Arc<dyn Logger>,
    history: Option<&TransferLog>,
) -> RoundStats {
    let mut stats = RoundStats::default();
    let (tx, rx) = mpsc::channel::<SessionReport>();
    let mut handles = Vec::new();

    for (request, expected) in eligible_requests(listing, requests, state) {
        if state.is_stopped() {
            break;
        }
        let weight = request.priority.weight();
        let filename = request.filename.clone();
        let priority = request.priority.as_str();
        let bar = progress.add_file(&filename, expected);
        let opts = opts.clone();
        let state = Arc::clone(state);
        let logger = Arc::clone(logger);
        let tx = tx.clone();

        stats.launched += 1;
        let handle = thread::spawn(move || {
            logger.session_start(&filename, expected, weight);
            let started = Instant::now();
            let result = client::download_file(&opts, &filename, expected, weight, &state, &bar);
            match &result {
                Ok(bytes) => {
                    bar.finish();
                    logger.session_done(&filename, *bytes, started.elapsed().as_secs_f64());
                }
                Err(e) => {
                    bar.abandon();
                    logger.error("download", &filename, &e.to_string());
                }
            }
            let _ = tx.send(SessionReport {
                filename,
                priority,
                expected,
                result,
            });
        });
        handles.push(handle);
    }
    drop(tx);

    for report in rx {
        let (status, bytes, error) = match report.result {
            Ok(bytes) => {
                stats.add_completed(bytes);
                (TransferStatus::Completed, bytes, None)
            }
            Err(TransferError::Interrupted { received }) => {
                stats.interrupted += 1;
                (TransferStatus::Interrupted, received, None)
            }
            Err(e) => {
                let bytes = match e {
                    TransferError::Partial { received, .. } => received,
                    _ => 0,
                };
                stats.add_error(format!("{}: {}", report.filename, e));
                (TransferStatus::Failed, bytes, Some(e.to_string()))
            }
        };
        if let Some(history) = history {
            let entry = TransferLogEntry::now(
                &report.filename,
                report.priority,
                report.expected,
                bytes,
                status,
                error,
            );
            if let Err(e) = history.add_entry(&entry) {
                eprintln!("history write failed: {}", e);
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    logger.round_done(stats.launched, stats.completed, stats.failed);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::Priority;

    fn req(name: &str, priority: Priority) -> DownloadRequest {
        DownloadRequest {
            filename: name.to_string(),
            priority,
        }
    }

    #[test]
    fn eligibility_is_exactly_listed_and_not_completed() {
        let mut listing = HashMap::new();
        listing.insert("a.bin".to_string(), 1000u64);
        listing.insert("b.bin".to_string(), 2000u64);
        listing.insert("c.bin".to_string(), 300u64);

        let state = TransferState::new();
        state.mark_completed("b.bin");

        let requests = vec![
            req("a.bin", Priority::High),
            req("b.bin", Priority::Normal),  // already completed
            req("missing.bin", Priority::Critical), // not on server
            req("c.bin", Priority::Normal),
        ];

        let eligible = eligible_requests(&listing, &requests, &state);
        let names: Vec<_> = eligible.iter().map(|(r, _)| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a.bin", "c.bin"]);
        assert_eq!(eligible[0].1, 1000);
    }

    #[test]
    fn duplicate_requests_collapse_to_first() {
        let mut listing = HashMap::new();
        listing.insert("a.bin".to_string(), 1000u64);

        let state = TransferState::new();
        let requests = vec![req("a.bin", Priority::High), req("a.bin", Priority::Normal)];

        let eligible = eligible_requests(&listing, &requests, &state);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].0.priority, Priority::High);
    }

    #[test]
    fn unlisted_file_stays_eligible_across_rounds() {
        let listing = HashMap::new();
        let state = TransferState::new();
        let requests = vec![req("ghost.bin", Priority::Normal)];

        // Never launched, never completed: the next round sees it again.
        assert!(eligible_requests(&listing, &requests, &state).is_empty());
        assert!(!state.is_completed("ghost.bin"));
    }

    #[test]
    fn state_progress_and_completion() {
        let state = TransferState::new();
        state.set_progress("a.bin", 40.0);
        assert_eq!(state.progress_of("a.bin"), Some(40.0));
        assert_eq!(state.progress_of("b.bin"), None);

        assert!(!state.is_completed("a.bin"));
        state.mark_completed("a.bin");
        assert!(state.is_completed("a.bin"));
    }

    #[test]
    fn stop_flag_latches() {
        let state = TransferState::new();
        assert!(!state.is_stopped());
        state.request_stop();
        assert!(state.is_stopped());
    }
}
