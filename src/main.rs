#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eyre::{Context, Result, bail};
use tracing::Level;

#[macro_use]
mod display;

mod app;
mod config;
mod signal;

use self::app::Engine;
use self::config::Config;
use self::signal::Signals;

/// Forward TCP connections from local addresses to remote ones.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Rule file, one `<local-host> <local-port> <remote-host> <remote-port>` per line.
    #[arg(short, long, default_value = "/etc/ports")]
    config: PathBuf,

    /// Parse the rule file, print the rules and exit.
    #[arg(long)]
    check: bool,

    /// Log more. Repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_max_level(args.log_level())
        .init();

    match try_main(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main(args: Args) -> Result<()> {
    let path = &args.config;

    let config = Config::read(path)
        .await
        .with_context(|| format!("{}", path.display()))?;

    if config.rules.is_empty() {
        bail!("{}: no redirect rules configured", path.display());
    }

    if args.check {
        for x in &config.rules {
            println!("{} -> {}", x.local, x.remote);
        }
        return Ok(());
    }

    let mut signals = Signals::new().context("failed to register signal handlers")?;

    Engine::new(config).run(signals.wait_terminate()).await;
    Ok(())
}
