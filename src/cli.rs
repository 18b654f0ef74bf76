//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::path::PathBuf;

/// Common daemon options used by ferryd
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:65432")]
    pub bind: String,

    /// Root directory to serve
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}
