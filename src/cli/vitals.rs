//! Vitals command.

use super::Context;
use clap::Args;
use guest_agent::stats::STATS_COLLECTION_INTERVAL;
use guest_agent::Error;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct VitalsCmd {
    /// Seconds to sample CPU before reporting (CPU usage needs two samples)
    #[arg(long, default_value_t = 1)]
    sample_secs: u64,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,
}

impl VitalsCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        let (_provider, platform) = ctx.platform()?;

        // The background loop samples on start; give it a window to diff.
        let window = Duration::from_secs(self.sample_secs).min(STATS_COLLECTION_INTERVAL);
        std::thread::sleep(window);

        let vitals = platform.vitals()?;
        let json = if self.pretty {
            serde_json::to_string_pretty(&vitals)
        } else {
            serde_json::to_string(&vitals)
        }
        .map_err(|e| Error::stats("encode vitals", e.to_string()))?;

        println!("{}", json);
        Ok(())
    }
}
