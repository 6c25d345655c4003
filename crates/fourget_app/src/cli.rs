use std::path::PathBuf;

use clap::Parser;

/// Download every file attached to an imageboard thread.
///
/// Files already present with a matching checksum are skipped, so running the
/// same command again only fetches what is new or was left incomplete.
#[derive(Debug, Parser)]
#[command(name = "fourget", version, about)]
pub struct Cli {
    /// Thread URL, e.g. https://boards.4channel.org/g/thread/76759434
    pub url: String,

    /// Directory the thread folder is created in [default: .]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of queued work items, 0 for unbounded [default: 10000]
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Number of concurrent downloads [default: 3]
    #[arg(short = 'w', long, value_name = "N")]
    pub worker_count: Option<usize>,

    /// RON settings file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More log output; repeat for trace
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}
