use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "devmirror")]
#[command(about = "Mirror a Dev.to author's posts into a static-site snapshot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the snapshot against the live API
    Sync {
        /// Refetch all history and replace the snapshot outright
        #[arg(long)]
        force_full: bool,

        /// Fetch and reconcile but write neither snapshot nor run state
        #[arg(long)]
        dry_run: bool,
    },

    /// Show last-run state and snapshot contents
    Status,
}
