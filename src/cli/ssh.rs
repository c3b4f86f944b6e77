//! SSH key command.

use super::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct SshCmd {
    /// User to install the key for
    #[arg(long, default_value = "vcap")]
    user: String,

    /// Public key line
    public_key: String,
}

impl SshCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        let (_provider, platform) = ctx.platform()?;
        platform.setup_ssh(&self.public_key, &self.user)?;
        println!("Installed key for {}", self.user);
        Ok(())
    }
}
