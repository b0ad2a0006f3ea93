// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{Local, TimeDelta};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tapasd::{Credentials, DEFAULT_FEED_URL, ReqwestClient, RunOptions, RunSummary, run};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Keep a local directory in sync with the RubyTapas episode feed
#[derive(Parser, Debug)]
#[command(name = "tapasd")]
#[command(about = "Download RubyTapas episodes and keep them up to date")]
#[command(version)]
struct Args {
    /// User for the RubyTapas account
    #[arg(short, long, env = "TAPAS_USER")]
    user: String,

    /// Password for the RubyTapas account
    #[arg(short, long, env = "TAPAS_PASS", hide_env_values = true)]
    pass: String,

    /// Data directory for downloads
    #[arg(short, long, env = "TAPAS_DATA", default_value = ".")]
    data: PathBuf,

    /// Number of concurrent downloads
    #[arg(
        short,
        long,
        env = "TAPAS_CONCURRENCY",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    concurrency: u16,

    /// Check and download once, then quit
    #[arg(long)]
    oneshot: bool,

    /// Number of seconds to sleep between polls
    #[arg(short, long, env = "TAPAS_INTERVAL", default_value_t = 60 * 60 * 6)]
    interval: u64,

    /// Feed to poll
    #[arg(long, env = "TAPAS_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Keep going when a single download hits an unexpected error
    #[arg(short, long)]
    keep_going: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only emit the log stream
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn print_summary(summary: &RunSummary, options: &RunOptions) {
    let problems = summary.rejected + summary.mismatched + summary.failed;

    println!(
        "{PARTY}{} {} downloaded, {} already present, {} to retry, {} malformed",
        "Poll complete:".bold().green(),
        summary.downloaded.to_string().green().bold(),
        summary.skipped.to_string().yellow(),
        if problems > 0 {
            problems.to_string().red().bold()
        } else {
            problems.to_string().green()
        },
        summary.malformed.to_string().dimmed()
    );
    println!(
        "{FOLDER}Output: {}",
        options.data_dir.display().to_string().cyan()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "tapasd".bold().magenta(),
            "- RubyTapas Downloader".dimmed()
        );
    }

    let client = ReqwestClient::new(Credentials::new(args.user, args.pass));

    let options = RunOptions {
        feed_url: args.feed_url,
        data_dir: args.data,
        concurrency: usize::from(args.concurrency),
        continue_on_error: args.keep_going,
    };

    loop {
        let summary = run(&client, &options)
            .await
            .context("Failed to process feed")?;

        if !args.quiet {
            print_summary(&summary, &options);
        }

        if args.oneshot {
            info!("Shutting down (one-shot mode)");
            break;
        }

        let interval = Duration::from_secs(args.interval);
        let next_poll = TimeDelta::from_std(interval)
            .ok()
            .and_then(|delta| Local::now().checked_add_signed(delta))
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        info!(seconds = args.interval, %next_poll, "Sleeping until next poll");
        tokio::time::sleep(interval).await;
        info!("Waking to process and download");
    }

    Ok(())
}
