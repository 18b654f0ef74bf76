use anyhow::{Context, Result};
use clap::Parser;

use ferry::cli::DaemonOpts;
use ferry::server;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    // Validate root directory exists and is a directory
    if !opts.root.exists() {
        anyhow::bail!("Error: Root directory does not exist: {}", opts.root.display());
    }
    if !opts.root.is_dir() {
        anyhow::bail!("Error: Root path is not a directory: {}", opts.root.display());
    }

    let canonical_root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("Failed to canonicalize root path: {}", opts.root.display()))?;

    println!("Starting ferry daemon:");
    println!("  Root: {}", canonical_root.display());
    println!("  Bind: {}", opts.bind);

    if opts.bind.starts_with("0.0.0.0") {
        eprintln!("WARNING: binding to 0.0.0.0 exposes the daemon to all interfaces");
        eprintln!("   This protocol is unencrypted and unauthenticated");
        eprintln!("   Only use on trusted networks (LAN)");
    }

    server::serve(&opts.bind, &canonical_root)
}
