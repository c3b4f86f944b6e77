//! Debian-family network configuration.

use super::{
    default_dns, render_dhclient_config, render_resolv_conf, static_interfaces, write_if_changed,
    ArpAnnouncer, InterfaceAddress, NetManager, Networks, StaticInterface, RESOLV_CONF,
};
use crate::error::{Error, Result};
use crate::system::{CmdRunner, FileSystem};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const UBUNTU_DHCLIENT_CONF: &str = "/etc/dhcp3/dhclient.conf";
pub const UBUNTU_INTERFACES: &str = "/etc/network/interfaces";

/// Writes `/etc/network/interfaces` and drives `/etc/init.d/networking`.
pub struct UbuntuNetManager {
    runner: Arc<dyn CmdRunner>,
    fs: Arc<dyn FileSystem>,
    arp: Arc<dyn ArpAnnouncer>,
}

impl UbuntuNetManager {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        fs: Arc<dyn FileSystem>,
        arp: Arc<dyn ArpAnnouncer>,
    ) -> Self {
        Self { runner, fs, arp }
    }

    fn restart_networking(&self) -> Result<()> {
        self.runner
            .run_checked("/etc/init.d/networking", &["restart"])
            .map_err(|e| Error::network("restart networking", e.to_string()))?;
        Ok(())
    }
}

fn render_interfaces(interfaces: &[StaticInterface]) -> String {
    let mut out = String::from("# Generated by guest-agent\nauto lo\niface lo inet loopback\n");
    for iface in interfaces {
        out.push_str(&format!(
            "\nauto {name}\niface {name} inet static\n    address {address}\n    network {network}\n    netmask {netmask}\n    broadcast {broadcast}\n",
            name = iface.name,
            address = iface.address,
            network = iface.network(),
            netmask = iface.netmask,
            broadcast = iface.broadcast(),
        ));
        if let Some(gateway) = iface.gateway {
            out.push_str(&format!("    gateway {}\n", gateway));
        }
    }
    out
}

impl NetManager for UbuntuNetManager {
    fn setup_dhcp(&self, networks: &Networks) -> Result<()> {
        let config = render_dhclient_config(networks);
        if !write_if_changed(self.fs.as_ref(), Path::new(UBUNTU_DHCLIENT_CONF), &config)? {
            info!(path = UBUNTU_DHCLIENT_CONF, "dhclient config unchanged");
            return Ok(());
        }

        info!(path = UBUNTU_DHCLIENT_CONF, "dhclient config updated, restarting dhcp");
        // dhclient3 may not be running; pkill exits 1 then.
        self.runner.run("pkill", &["dhclient3"])?;
        self.restart_networking()
    }

    fn setup_manual_networking(&self, networks: &Networks) -> Result<()> {
        let interfaces = static_interfaces(self.fs.as_ref(), networks)?;

        let changed = write_if_changed(
            self.fs.as_ref(),
            Path::new(UBUNTU_INTERFACES),
            &render_interfaces(&interfaces),
        )?;
        write_if_changed(
            self.fs.as_ref(),
            Path::new(RESOLV_CONF),
            &render_resolv_conf(&default_dns(networks)),
        )?;

        if changed {
            info!(interfaces = interfaces.len(), "interfaces updated, restarting networking");
            self.restart_networking()?;
        }

        self.arp.broadcast(
            interfaces
                .iter()
                .map(|i| InterfaceAddress::new(i.name.clone(), i.address))
                .collect(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::dhcp::EXPECTED_DHCP_CONFIG;
    use crate::net::test_support::{add_interfaces, dhcp_networks, manual_networks, RecordingArp};
    use crate::system::fakes::{FakeCmdRunner, FakeFileSystem};
    use crate::system::CmdOutput;
    use std::net::Ipv4Addr;

    fn setup() -> (
        Arc<FakeCmdRunner>,
        Arc<FakeFileSystem>,
        Arc<RecordingArp>,
        UbuntuNetManager,
    ) {
        let runner = Arc::new(FakeCmdRunner::new());
        let fs = Arc::new(FakeFileSystem::new());
        let arp = Arc::new(RecordingArp::default());
        let manager = UbuntuNetManager::new(runner.clone(), fs.clone(), arp.clone());
        (runner, fs, arp, manager)
    }

    #[test]
    fn test_setup_dhcp_writes_config_and_restarts() {
        let (runner, fs, _, manager) = setup();
        manager.setup_dhcp(&dhcp_networks()).unwrap();

        assert_eq!(
            fs.contents(UBUNTU_DHCLIENT_CONF).as_deref(),
            Some(EXPECTED_DHCP_CONFIG)
        );
        assert_eq!(
            runner.commands(),
            vec![
                vec!["pkill".to_string(), "dhclient3".to_string()],
                vec!["/etc/init.d/networking".to_string(), "restart".to_string()],
            ]
        );
    }

    #[test]
    fn test_setup_dhcp_with_existing_config_does_nothing() {
        let (runner, fs, _, manager) = setup();
        fs.add_file(UBUNTU_DHCLIENT_CONF, EXPECTED_DHCP_CONFIG);

        manager.setup_dhcp(&dhcp_networks()).unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_setup_dhcp_tolerates_no_dhclient() {
        let (runner, _, _, manager) = setup();
        runner.set_result("pkill dhclient3", CmdOutput::failed(1, ""));
        manager.setup_dhcp(&dhcp_networks()).unwrap();
    }

    #[test]
    fn test_manual_networking_writes_files_and_announces() {
        let (runner, fs, arp, manager) = setup();
        add_interfaces(&fs);

        manager.setup_manual_networking(&manual_networks()).unwrap();

        let interfaces = fs.contents(UBUNTU_INTERFACES).unwrap();
        assert!(interfaces.contains("iface eth0 inet static"));
        assert!(interfaces.contains("    address 10.0.0.5\n"));
        assert!(interfaces.contains("    netmask 255.255.255.0\n"));
        assert!(interfaces.contains("    broadcast 10.0.0.255\n"));
        assert!(interfaces.contains("    gateway 10.0.0.1\n"));

        let resolv = fs.contents(RESOLV_CONF).unwrap();
        assert!(resolv.contains("nameserver 8.8.8.8\nnameserver 8.8.4.4\n"));

        assert_eq!(runner.rendered_commands(), vec!["/etc/init.d/networking restart"]);
        assert_eq!(
            *arp.broadcasts.lock(),
            vec![vec![InterfaceAddress::new("eth0", Ipv4Addr::new(10, 0, 0, 5))]]
        );
    }

    #[test]
    fn test_manual_networking_unchanged_skips_restart_but_announces() {
        let (runner, fs, arp, manager) = setup();
        add_interfaces(&fs);

        manager.setup_manual_networking(&manual_networks()).unwrap();
        manager.setup_manual_networking(&manual_networks()).unwrap();

        assert_eq!(runner.commands().len(), 1);
        assert_eq!(arp.broadcasts.lock().len(), 2);
    }

    #[test]
    fn test_manual_networking_restart_failure() {
        let (runner, fs, arp, manager) = setup();
        add_interfaces(&fs);
        runner.set_result(
            "/etc/init.d/networking restart",
            CmdOutput::failed(1, "ifup failed"),
        );

        let err = manager
            .setup_manual_networking(&manual_networks())
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
        assert!(arp.broadcasts.lock().is_empty());
    }
}
