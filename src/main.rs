use clap::Parser;

use devmirror::api::ApiClient;
use devmirror::cli::{Cli, Commands};
use devmirror::config::Config;
use devmirror::errors::MirrorResult;
use devmirror::services::{FetchOptions, FetchService, SyncOutcome, SyncService};
use devmirror::storage::traits::{RunStateTracker, SnapshotStore};
use devmirror::storage::{FsRunStateTracker, JsonSnapshotStore};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> MirrorResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Sync { force_full, dry_run } => cmd_sync(&config, force_full, dry_run),
        Commands::Status => cmd_status(&config),
    }
}

fn cmd_sync(config: &Config, force_full: bool, dry_run: bool) -> MirrorResult<()> {
    let api = ApiClient::new(config)?;
    let fetcher = FetchService::new(api, FetchOptions::from_config(config));
    let snapshot = JsonSnapshotStore::new(config.snapshot_path());
    let run_state = FsRunStateTracker::new(config.last_run_path(), config.no_new_posts_path())
        .with_ci_outputs(config.github_output.clone(), config.github_step_summary.clone());

    let force = force_full || config.force_full_regen;
    let service = SyncService::new(fetcher, snapshot, run_state, config.username.clone(), force);

    println!("Synchronizing posts for {}...", config.username);
    let report = service.run(dry_run)?;

    match report.outcome {
        SyncOutcome::NoNewPosts => {
            println!("No new posts since last run. Skipping generation.");
        }
        SyncOutcome::FullRegen => {
            println!("Full regeneration: {} posts fetched.", report.posts.len());
        }
        SyncOutcome::Incremental => {
            println!(
                "Found {} new/updated posts. Total posts: {}",
                report.new_or_updated,
                report.posts.len()
            );
        }
        SyncOutcome::CacheFallback => {
            println!(
                "API unavailable. Reusing {} cached posts; will retry the window next run.",
                report.posts.len()
            );
        }
    }

    for change in &report.slug_changes {
        println!(
            "  Slug changed for post {}: {} -> {}",
            change.id, change.old_slug, change.new_slug
        );
    }

    if dry_run {
        println!("Dry run complete. Nothing was written.");
    }

    Ok(())
}

fn cmd_status(config: &Config) -> MirrorResult<()> {
    let run_state = FsRunStateTracker::new(config.last_run_path(), config.no_new_posts_path());
    let snapshot = JsonSnapshotStore::new(config.snapshot_path());

    match run_state.get_last_run()? {
        Some(timestamp) => println!("Last successful run: {}", timestamp),
        None => println!("No recorded runs yet."),
    }

    let posts = snapshot.load()?;
    println!("Snapshot: {} posts ({})", posts.len(), config.snapshot_path().display());
    for post in posts.iter().take(10) {
        println!("  {}  {}", post.date, post.title);
    }
    if posts.len() > 10 {
        println!("  ... and {} more", posts.len() - 10);
    }

    Ok(())
}
