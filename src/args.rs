// Commandline argument parser using clap for the monitor binary

use clap::Parser;

/// Watch derived headset statistics on the terminal.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct MonitorArgs {
    /// Local interface the headset application streams to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Local UDP port to listen on (0 picks a free port)
    #[arg(short, long, default_value_t = 12002)]
    pub port: u16,

    /// Samples retained per channel
    #[arg(long, default_value_t = 250)]
    pub history: usize,

    /// Receive buffer size in bytes, per poll
    #[arg(short, long, default_value_t = 1024)]
    pub buffer: usize,

    /// Poll ticks per second
    #[arg(short, long, default_value_t = 40.0)]
    pub rate: f64,

    /// Print a statistics line every N ticks
    #[arg(long, default_value_t = 40)]
    pub report_every: u64,

    /// Feed the session from a built-in synthetic headset
    #[arg(long)]
    pub dummy: bool,
}
