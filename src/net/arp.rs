//! Gratuitous ARP announcements.
//!
//! After static addresses are applied, switches and peers may still cache the
//! previous owner of an address. ARP has no acknowledgement, so the announcer
//! simply repeats `arping -U` a fixed number of rounds on a background thread
//! and never reports back; failures are only logged. [`Arping::wait`] joins
//! the outstanding threads for callers that are about to exit.

use crate::error::Result;
use crate::retry::{Attempt, AttemptRetryStrategy};
use crate::system::{CmdRunner, FileSystem};
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::SYS_CLASS_NET;

/// Announcement rounds.
pub const ARP_ITERATIONS: u32 = 20;

/// Delay between rounds.
pub const ARP_ITERATION_DELAY: Duration = Duration::from_secs(5);

/// Delay between interfaces within a round.
pub const ARP_INTERFACE_CHECK_DELAY: Duration = Duration::from_millis(100);

/// Announcement schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpConfig {
    pub iterations: u32,
    pub iteration_delay: Duration,
    pub interface_check_delay: Duration,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            iterations: ARP_ITERATIONS,
            iteration_delay: ARP_ITERATION_DELAY,
            interface_check_delay: ARP_INTERFACE_CHECK_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub interface: String,
    pub ip: Ipv4Addr,
}

impl InterfaceAddress {
    pub fn new(interface: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            interface: interface.into(),
            ip,
        }
    }
}

/// Fire-and-forget address announcement.
pub trait ArpAnnouncer: Send + Sync {
    /// Announce the current IPv4 address of each named interface.
    fn announce_on(&self, interfaces: &[String]);

    /// Announce explicit interface/address pairs.
    fn broadcast(&self, addresses: Vec<InterfaceAddress>);
}

/// [`ArpAnnouncer`] that shells out to `arping`.
///
/// Clones share the set of running announcement threads.
#[derive(Clone)]
pub struct Arping {
    runner: Arc<dyn CmdRunner>,
    fs: Arc<dyn FileSystem>,
    config: ArpConfig,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Arping {
    pub fn new(runner: Arc<dyn CmdRunner>, fs: Arc<dyn FileSystem>, config: ArpConfig) -> Self {
        Self {
            runner,
            fs,
            config,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Block until every announcement started so far has run all its rounds.
    pub fn wait(&self) {
        let handles = std::mem::take(&mut *self.pending.lock());
        if !handles.is_empty() {
            debug!(threads = handles.len(), "waiting for arp announcements");
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("arp announcement thread panicked");
            }
        }
    }

    /// Run every announcement round on the calling thread.
    pub fn announce_blocking(&self, addresses: &[InterfaceAddress]) {
        if addresses.is_empty() {
            return;
        }

        let strategy = AttemptRetryStrategy::new(
            "arp announce",
            self.config.iterations,
            self.config.iteration_delay,
        );

        // Every round asks for another; running out of rounds is the normal end.
        let outcome = strategy.run(|| {
            self.round(addresses);
            Attempt::Retry(None)
        });
        if let Err(e) = outcome {
            debug!(rounds = self.config.iterations, result = %e, "arp announcement finished");
        }
    }

    /// Look up the primary IPv4 address of `interface`.
    pub fn interface_address(&self, interface: &str) -> Result<Option<Ipv4Addr>> {
        let output = self
            .runner
            .run_checked("ip", &["-4", "-o", "addr", "show", "dev", interface])?;
        Ok(parse_ip_addr_output(&output.stdout))
    }

    fn round(&self, addresses: &[InterfaceAddress]) {
        for address in addresses {
            let sys_path = Path::new(SYS_CLASS_NET).join(&address.interface);
            if !self.fs.exists(&sys_path) {
                debug!(interface = %address.interface, "interface missing, skipping arp");
            } else {
                self.arping(address);
            }
            std::thread::sleep(self.config.interface_check_delay);
        }
    }

    fn arping(&self, address: &InterfaceAddress) {
        let ip = address.ip.to_string();
        let args = ["-c", "1", "-U", "-I", address.interface.as_str(), ip.as_str()];
        match self.runner.run("arping", &args) {
            Ok(output) if output.success() => {}
            Ok(output) => warn!(
                interface = %address.interface,
                ip = %address.ip,
                reason = %output.failure_reason(),
                "arping failed"
            ),
            Err(e) => warn!(
                interface = %address.interface,
                ip = %address.ip,
                error = %e,
                "arping could not run"
            ),
        }
    }

    fn resolve_addresses(&self, interfaces: &[String]) -> Vec<InterfaceAddress> {
        interfaces
            .iter()
            .filter_map(|interface| match self.interface_address(interface) {
                Ok(Some(ip)) => Some(InterfaceAddress::new(interface.clone(), ip)),
                Ok(None) => {
                    warn!(interface = %interface, "interface has no ipv4 address, not announcing");
                    None
                }
                Err(e) => {
                    warn!(interface = %interface, error = %e, "failed to look up interface address");
                    None
                }
            })
            .collect()
    }

    fn spawn(&self, job: impl FnOnce(Arping) + Send + 'static) {
        let announcer = self.clone();
        let spawned = std::thread::Builder::new()
            .name("arp-announce".to_string())
            .spawn(move || job(announcer));
        match spawned {
            Ok(handle) => {
                let mut pending = self.pending.lock();
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
            Err(e) => warn!(error = %e, "failed to start arp announcement thread"),
        }
    }
}

impl ArpAnnouncer for Arping {
    fn announce_on(&self, interfaces: &[String]) {
        let interfaces = interfaces.to_vec();
        self.spawn(move |announcer| {
            let addresses = announcer.resolve_addresses(&interfaces);
            announcer.announce_blocking(&addresses);
        });
    }

    fn broadcast(&self, addresses: Vec<InterfaceAddress>) {
        info!(
            interfaces = addresses.len(),
            rounds = self.config.iterations,
            "starting gratuitous arp"
        );
        self.spawn(move |announcer| announcer.announce_blocking(&addresses));
    }
}

/// Extract the address from `ip -4 -o addr show` output.
fn parse_ip_addr_output(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        fields.find(|f| *f == "inet")?;
        let cidr = fields.next()?;
        cidr.split('/').next()?.parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fakes::{FakeCmdRunner, FakeFileSystem};
    use crate::system::CmdOutput;
    use std::time::Instant;

    fn quick_config(iterations: u32) -> ArpConfig {
        ArpConfig {
            iterations,
            iteration_delay: Duration::from_millis(1),
            interface_check_delay: Duration::ZERO,
        }
    }

    fn setup(iterations: u32) -> (Arc<FakeCmdRunner>, Arc<FakeFileSystem>, Arping) {
        let runner = Arc::new(FakeCmdRunner::new());
        let fs = Arc::new(FakeFileSystem::new());
        fs.add_dir("/sys/class/net/eth0");
        let arping = Arping::new(runner.clone(), fs.clone(), quick_config(iterations));
        (runner, fs, arping)
    }

    #[test]
    fn test_default_schedule() {
        let config = ArpConfig::default();
        assert_eq!(config.iterations, 20);
        assert_eq!(config.iteration_delay, Duration::from_secs(5));
        assert_eq!(config.interface_check_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_announces_every_round() {
        let (runner, _, arping) = setup(3);
        arping.announce_blocking(&[InterfaceAddress::new("eth0", Ipv4Addr::new(10, 0, 0, 5))]);

        let commands = runner.rendered_commands();
        assert_eq!(commands.len(), 3);
        assert!(commands
            .iter()
            .all(|c| c == "arping -c 1 -U -I eth0 10.0.0.5"));
    }

    #[test]
    fn test_skips_missing_interfaces() {
        let (runner, _, arping) = setup(2);
        arping.announce_blocking(&[
            InterfaceAddress::new("eth0", Ipv4Addr::new(10, 0, 0, 5)),
            InterfaceAddress::new("eth9", Ipv4Addr::new(10, 0, 9, 5)),
        ]);

        let commands = runner.rendered_commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.contains("eth0")));
    }

    #[test]
    fn test_arping_failures_do_not_stop_rounds() {
        let (runner, _, arping) = setup(4);
        runner.set_result(
            "arping -c 1 -U -I eth0 10.0.0.5",
            CmdOutput::failed(2, "permission denied"),
        );
        arping.announce_blocking(&[InterfaceAddress::new("eth0", Ipv4Addr::new(10, 0, 0, 5))]);
        assert_eq!(runner.commands().len(), 4);
    }

    #[test]
    fn test_parse_ip_addr_output() {
        let output = "2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever preferred_lft forever\n";
        assert_eq!(
            parse_ip_addr_output(output),
            Some(Ipv4Addr::new(10, 0, 0, 5))
        );
        assert_eq!(parse_ip_addr_output(""), None);
    }

    #[test]
    fn test_announce_on_runs_in_background() {
        let (runner, _, arping) = setup(1);
        runner.set_result(
            "ip -4 -o addr show dev eth0",
            CmdOutput::ok("2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\n"),
        );

        arping.announce_on(&["eth0".to_string()]);

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if runner
                .rendered_commands()
                .contains(&"arping -c 1 -U -I eth0 10.0.0.5".to_string())
            {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("arping never ran: {:?}", runner.rendered_commands());
    }

    #[test]
    fn test_wait_joins_broadcast() {
        let (runner, _, arping) = setup(3);
        arping.broadcast(vec![InterfaceAddress::new("eth0", Ipv4Addr::new(10, 0, 0, 5))]);
        arping.broadcast(vec![InterfaceAddress::new("eth0", Ipv4Addr::new(10, 0, 0, 6))]);

        arping.clone().wait();

        assert_eq!(runner.commands().len(), 6);
        assert!(arping.pending.lock().is_empty());
    }

    #[test]
    fn test_announce_on_skips_interfaces_without_address() {
        let (runner, _, arping) = setup(1);
        runner.set_result("ip -4 -o addr show dev eth0", CmdOutput::ok(""));

        let addresses = arping.resolve_addresses(&["eth0".to_string()]);
        assert!(addresses.is_empty());
        assert_eq!(runner.rendered_commands(), vec!["ip -4 -o addr show dev eth0"]);
    }
}
