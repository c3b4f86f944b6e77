//! Guest network configuration.
//!
//! A [`NetManager`] turns the network section of the agent settings into OS
//! configuration files for one distribution family, restarts networking when
//! the files changed and, for static addresses, hands the configured
//! interfaces to the [`ArpAnnouncer`] so peers drop stale cache entries.

pub mod arp;
mod centos;
mod dhcp;
mod ubuntu;

pub use arp::{ArpAnnouncer, ArpConfig, Arping, InterfaceAddress};
pub use centos::CentosNetManager;
pub use dhcp::render_dhclient_config;
pub use ubuntu::UbuntuNetManager;

use crate::error::{Error, Result};
use crate::system::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

/// Where the kernel lists network interfaces.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Resolver configuration written for static networks.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Networks keyed by name, as delivered in the agent settings.
pub type Networks = BTreeMap<String, NetworkSettings>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Manual,
    Dynamic,
}

/// Settings for one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    #[serde(rename = "type")]
    pub kind: NetworkType,
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
    pub mac: String,
    pub dns: Vec<String>,
    /// Which defaults this network provides (`"dns"`, `"gateway"`).
    pub default: Vec<String>,
}

impl NetworkSettings {
    pub fn is_default_for(&self, category: &str) -> bool {
        self.default.iter().any(|d| d == category)
    }
}

/// DNS servers of the network that provides the `dns` default.
pub fn default_dns(networks: &Networks) -> Vec<String> {
    networks
        .values()
        .find(|n| n.is_default_for("dns"))
        .map(|n| n.dns.clone())
        .unwrap_or_default()
}

/// Manual network bound to the interface that carries its MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticInterface {
    pub name: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
}

impl StaticInterface {
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & u32::from(self.netmask))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !u32::from(self.netmask))
    }
}

fn parse_ipv4(network: &str, field: &str, value: &str) -> Result<Ipv4Addr> {
    value.parse().map_err(|_| {
        Error::network(
            "parse network settings",
            format!("network {} has invalid {} {:?}", network, field, value),
        )
    })
}

/// Map each manual network to an interface by MAC address.
///
/// Dynamic networks are skipped. The default gateway is only attached to the
/// network that provides the `gateway` default.
pub fn static_interfaces(fs: &dyn FileSystem, networks: &Networks) -> Result<Vec<StaticInterface>> {
    let by_mac = interfaces_by_mac(fs)?;
    let mut interfaces = Vec::new();

    for (name, settings) in networks {
        if settings.kind != NetworkType::Manual {
            continue;
        }

        let mac = settings.mac.to_ascii_lowercase();
        if mac.is_empty() {
            return Err(Error::network(
                "find interface",
                format!("network {} has no mac address", name),
            ));
        }
        let interface = by_mac.get(&mac).ok_or_else(|| {
            Error::network(
                "find interface",
                format!("no interface with mac {} for network {}", mac, name),
            )
        })?;

        let gateway = if settings.is_default_for("gateway") && !settings.gateway.is_empty() {
            Some(parse_ipv4(name, "gateway", &settings.gateway)?)
        } else {
            None
        };

        interfaces.push(StaticInterface {
            name: interface.clone(),
            address: parse_ipv4(name, "ip", &settings.ip)?,
            netmask: parse_ipv4(name, "netmask", &settings.netmask)?,
            gateway,
        });
    }

    Ok(interfaces)
}

/// Interface names keyed by lowercase MAC address.
fn interfaces_by_mac(fs: &dyn FileSystem) -> Result<BTreeMap<String, String>> {
    let sys = Path::new(SYS_CLASS_NET);
    let names = fs
        .list_dir(sys)
        .map_err(|e| Error::network("list interfaces", e.to_string()))?;

    let mut by_mac = BTreeMap::new();
    for name in names {
        if let Ok(address) = fs.read_to_string(&sys.join(&name).join("address")) {
            by_mac.insert(address.trim().to_ascii_lowercase(), name);
        }
    }
    Ok(by_mac)
}

/// `/etc/resolv.conf` contents for the default DNS servers.
pub fn render_resolv_conf(dns: &[String]) -> String {
    let mut out = String::from("# Generated by guest-agent\n");
    for server in dns {
        out.push_str(&format!("nameserver {}\n", server));
    }
    out
}

/// Write `contents` to `path` unless it already holds exactly that.
///
/// Returns true if the file was written.
pub(crate) fn write_if_changed(fs: &dyn FileSystem, path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = fs.read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }
    fs.write_file(path, contents)?;
    Ok(true)
}

/// Applies network settings for one OS family.
pub trait NetManager: Send + Sync {
    /// Configure DHCP client DNS handling and restart DHCP if needed.
    fn setup_dhcp(&self, networks: &Networks) -> Result<()>;

    /// Write static interface configuration, restart networking and announce
    /// the new addresses.
    fn setup_manual_networking(&self, networks: &Networks) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::system::fakes::FakeFileSystem;
    use parking_lot::Mutex;

    /// Records broadcasts instead of sending them.
    #[derive(Default)]
    pub struct RecordingArp {
        pub broadcasts: Mutex<Vec<Vec<InterfaceAddress>>>,
        pub announced: Mutex<Vec<String>>,
    }

    impl ArpAnnouncer for RecordingArp {
        fn announce_on(&self, interfaces: &[String]) {
            self.announced.lock().extend(interfaces.iter().cloned());
        }

        fn broadcast(&self, addresses: Vec<InterfaceAddress>) {
            self.broadcasts.lock().push(addresses);
        }
    }

    /// Two interfaces: eth0 (`aa:..:01`) and eth1 (`aa:..:02`).
    pub fn add_interfaces(fs: &FakeFileSystem) {
        fs.add_file("/sys/class/net/eth0/address", "aa:bb:cc:dd:ee:01\n");
        fs.add_file("/sys/class/net/eth1/address", "AA:BB:CC:DD:EE:02\n");
        fs.add_file("/sys/class/net/lo/address", "00:00:00:00:00:00\n");
    }

    pub fn manual_networks() -> Networks {
        let mut networks = Networks::new();
        networks.insert(
            "default".to_string(),
            NetworkSettings {
                kind: NetworkType::Manual,
                ip: "10.0.0.5".to_string(),
                netmask: "255.255.255.0".to_string(),
                gateway: "10.0.0.1".to_string(),
                mac: "aa:bb:cc:dd:ee:01".to_string(),
                dns: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
                default: vec!["dns".to_string(), "gateway".to_string()],
            },
        );
        networks
    }

    pub fn dhcp_networks() -> Networks {
        let mut networks = Networks::new();
        networks.insert(
            "bosh".to_string(),
            NetworkSettings {
                kind: NetworkType::Dynamic,
                default: vec!["dns".to_string()],
                dns: vec![
                    "xx.xx.xx.xx".to_string(),
                    "yy.yy.yy.yy".to_string(),
                    "zz.zz.zz.zz".to_string(),
                ],
                ..Default::default()
            },
        );
        networks.insert(
            "vip".to_string(),
            NetworkSettings {
                kind: NetworkType::Dynamic,
                dns: vec!["aa.aa.aa.aa".to_string()],
                ..Default::default()
            },
        );
        networks
    }
}
