//! Supervisor commands.

use super::Context;
use clap::Subcommand;

/// Control monit
#[derive(Subcommand, Debug)]
pub enum MonitCmd {
    /// Start monit and wait until it answers
    Start,
}

impl MonitCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        match self {
            MonitCmd::Start => {
                let (_provider, platform) = ctx.platform()?;
                platform.start_monit()?;
                println!("monit is running");
                Ok(())
            }
        }
    }
}
