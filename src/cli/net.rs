//! Network commands.

use super::{load_networks, Context};
use clap::{Args, Subcommand};
use guest_agent::net::{ArpConfig, Arping, InterfaceAddress};
use guest_agent::system::{ExecCmdRunner, OsFileSystem};
use guest_agent::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configure networking
#[derive(Subcommand, Debug)]
pub enum NetCmd {
    /// Write DHCP client configuration from a networks file
    Dhcp(DhcpCmd),

    /// Apply static addressing from a networks file and announce it
    Manual(ManualCmd),

    /// Send gratuitous ARP for interfaces in the foreground
    Announce(AnnounceCmd),
}

impl NetCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        match self {
            NetCmd::Dhcp(cmd) => cmd.run(ctx),
            NetCmd::Manual(cmd) => cmd.run(ctx),
            NetCmd::Announce(cmd) => cmd.run(),
        }
    }
}

#[derive(Args, Debug)]
pub struct DhcpCmd {
    /// Networks JSON file
    networks: PathBuf,
}

impl DhcpCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        let networks = load_networks(&self.networks)?;
        let (_provider, platform) = ctx.platform()?;
        platform.setup_dhcp(&networks)
    }
}

#[derive(Args, Debug)]
pub struct ManualCmd {
    /// Networks JSON file
    networks: PathBuf,
}

impl ManualCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        let networks = load_networks(&self.networks)?;
        let (provider, platform) = ctx.platform()?;
        platform.setup_manual_networking(&networks)?;

        println!("Networking configured, announcing addresses...");
        provider.wait_for_announcements();
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct AnnounceCmd {
    /// Interfaces as NAME or NAME=IPV4; a bare name uses its current address
    #[arg(required = true)]
    interfaces: Vec<String>,

    /// Announcement rounds
    #[arg(long, default_value_t = ArpConfig::default().iterations)]
    iterations: u32,

    /// Delay between rounds in milliseconds
    #[arg(long, default_value_t = ArpConfig::default().iteration_delay.as_millis() as u64)]
    delay_ms: u64,
}

impl AnnounceCmd {
    pub fn run(self) -> guest_agent::Result<()> {
        let config = ArpConfig {
            iterations: self.iterations,
            iteration_delay: Duration::from_millis(self.delay_ms),
            ..ArpConfig::default()
        };
        let arping = Arping::new(
            Arc::new(ExecCmdRunner::new()),
            Arc::new(OsFileSystem::new()),
            config,
        );

        let mut addresses = Vec::new();
        for entry in &self.interfaces {
            match entry.split_once('=') {
                Some((name, ip)) => {
                    let ip = ip.parse().map_err(|_| {
                        Error::network("parse address", format!("invalid ipv4 address {:?}", ip))
                    })?;
                    addresses.push(InterfaceAddress::new(name, ip));
                }
                None => match arping.interface_address(entry)? {
                    Some(ip) => addresses.push(InterfaceAddress::new(entry.clone(), ip)),
                    None => {
                        return Err(Error::network(
                            "find address",
                            format!("{} has no ipv4 address", entry),
                        ))
                    }
                },
            }
        }

        println!(
            "Announcing {} interface(s), {} rounds...",
            addresses.len(),
            config.iterations
        );
        arping.announce_blocking(&addresses);
        Ok(())
    }
}
