//! ferry - priority-paced file fetch client

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ferry::client::{self, ClientOpts, DEFAULT_READ_TIMEOUT};
use ferry::log::TransferLog;
use ferry::logger::{Logger, NoopLogger, TextLogger};
use ferry::priority::Priority;
use ferry::scheduler::TransferState;
use ferry::url;

#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    version,
    about = "Fetch files from a ferryd server, paced by priority"
)]
struct Args {
    /// Server address: host, host:port, or ferry://host[:port]
    server: String,

    /// Request list, one `filename [CRITICAL|HIGH|NORMAL]` per line,
    /// re-read between rounds
    #[arg(long, default_value = "input.txt")]
    input: PathBuf,

    /// Directory downloads are written into
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Seconds to wait between scheduling rounds
    #[arg(long, default_value_t = 2)]
    interval: u64,

    /// Socket read timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_millis() as u64)]
    read_timeout_ms: u64,

    /// Write timestamped log entries to file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Append a JSONL record per finished session to file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let state = Arc::new(TransferState::new());

    // First Ctrl-C requests a cooperative stop; in-flight sessions finish
    // their current chunk and the loop exits. A second Ctrl-C force-quits.
    {
        let state = state.clone();
        ctrlc::set_handler(move || {
            if state.is_stopped() {
                std::process::exit(130);
            }
            eprintln!("\nInterrupted; finishing in-flight chunks (Ctrl-C again to force quit)");
            state.request_stop();
        })
        .expect("Error setting Ctrl-C handler");
    }

    let addr = url::connect_addr(&args.server)
        .ok_or_else(|| anyhow::anyhow!("invalid server address: {}", args.server))?;

    // Choose logger once; zero overhead in hot paths with NoopLogger
    let logger: Arc<dyn Logger> = if let Some(ref p) = args.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    let history = args.history.as_ref().map(TransferLog::new);

    if args.verbose {
        println!("ferry {}", env!("CARGO_PKG_VERSION"));
        println!("Server: {}", addr);
        println!("Requests: {}", args.input.display());
        println!("Output: {}", args.output.display());
        println!(
            "Priorities: CRITICAL={} HIGH={} NORMAL={}",
            Priority::Critical.weight(),
            Priority::High.weight(),
            Priority::Normal.weight()
        );
    }

    let opts = ClientOpts {
        addr,
        input: args.input,
        dest_dir: args.output,
        interval: Duration::from_secs(args.interval),
        read_timeout: Duration::from_millis(args.read_timeout_ms),
        show_progress: !args.no_progress,
        verbose: args.verbose,
    };

    client::run(&opts, state, logger, history)
}
