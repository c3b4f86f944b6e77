//! guest-agent CLI entry point.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

/// guest-agent - configure disks, networking and monit inside a VM guest
#[derive(Parser, Debug)]
#[command(name = "guest-agent")]
#[command(about = "Bring a VM guest's disks, network and supervisor into the configured state")]
#[command(version)]
struct Cli {
    /// Agent configuration file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the OS family from the configuration
    #[arg(long, global = true, value_name = "NAME")]
    platform: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prepare ephemeral and persistent disks
    #[command(subcommand)]
    Disk(cli::disk::DiskCmd),

    /// Configure networking
    #[command(subcommand)]
    Net(cli::net::NetCmd),

    /// Control the monit process supervisor
    #[command(subcommand)]
    Monit(cli::monit::MonitCmd),

    /// Print a vitals snapshot as JSON
    Vitals(cli::vitals::VitalsCmd),

    /// Install an ssh public key for a user
    Ssh(cli::ssh::SshCmd),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on RUST_LOG or default to info
    init_logging();

    tracing::debug!(version = guest_agent::VERSION, "starting guest-agent");

    let result = cli::Context::load(cli.config.as_deref(), cli.platform).and_then(|ctx| {
        match cli.command {
            Commands::Disk(cmd) => cmd.run(&ctx),
            Commands::Net(cmd) => cmd.run(&ctx),
            Commands::Monit(cmd) => cmd.run(&ctx),
            Commands::Vitals(cmd) => cmd.run(&ctx),
            Commands::Ssh(cmd) => cmd.run(&ctx),
        }
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guest_agent=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
