//! Red Hat-family network configuration.

use super::{
    default_dns, render_dhclient_config, render_resolv_conf, static_interfaces, write_if_changed,
    ArpAnnouncer, InterfaceAddress, NetManager, Networks, StaticInterface, RESOLV_CONF,
};
use crate::error::{Error, Result};
use crate::system::{CmdRunner, FileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const CENTOS_DHCLIENT_CONF: &str = "/etc/dhcp/dhclient.conf";
pub const CENTOS_NETWORK_SCRIPTS: &str = "/etc/sysconfig/network-scripts";

/// Writes `ifcfg-<iface>` files and drives `service network`.
pub struct CentosNetManager {
    runner: Arc<dyn CmdRunner>,
    fs: Arc<dyn FileSystem>,
    arp: Arc<dyn ArpAnnouncer>,
}

impl CentosNetManager {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        fs: Arc<dyn FileSystem>,
        arp: Arc<dyn ArpAnnouncer>,
    ) -> Self {
        Self { runner, fs, arp }
    }

    fn restart_networking(&self) -> Result<()> {
        self.runner
            .run_checked("service", &["network", "restart"])
            .map_err(|e| Error::network("restart networking", e.to_string()))?;
        Ok(())
    }
}

fn ifcfg_path(interface: &str) -> PathBuf {
    Path::new(CENTOS_NETWORK_SCRIPTS).join(format!("ifcfg-{}", interface))
}

fn render_ifcfg(iface: &StaticInterface) -> String {
    let mut out = format!(
        "DEVICE={}\nBOOTPROTO=static\nIPADDR={}\nNETMASK={}\nBROADCAST={}\nNETWORK={}\n",
        iface.name,
        iface.address,
        iface.netmask,
        iface.broadcast(),
        iface.network(),
    );
    if let Some(gateway) = iface.gateway {
        out.push_str(&format!("GATEWAY={}\n", gateway));
    }
    out.push_str("ONBOOT=yes\n");
    out
}

impl NetManager for CentosNetManager {
    fn setup_dhcp(&self, networks: &Networks) -> Result<()> {
        let config = render_dhclient_config(networks);
        if !write_if_changed(self.fs.as_ref(), Path::new(CENTOS_DHCLIENT_CONF), &config)? {
            info!(path = CENTOS_DHCLIENT_CONF, "dhclient config unchanged");
            return Ok(());
        }

        info!(path = CENTOS_DHCLIENT_CONF, "dhclient config updated, restarting network");
        self.restart_networking()
    }

    fn setup_manual_networking(&self, networks: &Networks) -> Result<()> {
        let interfaces = static_interfaces(self.fs.as_ref(), networks)?;

        let mut changed = false;
        for iface in &interfaces {
            changed |= write_if_changed(
                self.fs.as_ref(),
                &ifcfg_path(&iface.name),
                &render_ifcfg(iface),
            )?;
        }
        write_if_changed(
            self.fs.as_ref(),
            Path::new(RESOLV_CONF),
            &render_resolv_conf(&default_dns(networks)),
        )?;

        if changed {
            info!(interfaces = interfaces.len(), "ifcfg updated, restarting network");
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

    fn setup() -> (
        Arc<FakeCmdRunner>,
        Arc<FakeFileSystem>,
        Arc<RecordingArp>,
        CentosNetManager,
    ) {
        let runner = Arc::new(FakeCmdRunner::new());
        let fs = Arc::new(FakeFileSystem::new());
        let arp = Arc::new(RecordingArp::default());
        let manager = CentosNetManager::new(runner.clone(), fs.clone(), arp.clone());
        (runner, fs, arp, manager)
    }

    #[test]
    fn test_setup_dhcp_restarts_network_service() {
        let (runner, fs, _, manager) = setup();
        manager.setup_dhcp(&dhcp_networks()).unwrap();

        assert_eq!(
            fs.contents(CENTOS_DHCLIENT_CONF).as_deref(),
            Some(EXPECTED_DHCP_CONFIG)
        );
        assert_eq!(runner.rendered_commands(), vec!["service network restart"]);
    }

    #[test]
    fn test_setup_dhcp_unchanged() {
        let (runner, fs, _, manager) = setup();
        fs.add_file(CENTOS_DHCLIENT_CONF, EXPECTED_DHCP_CONFIG);
        manager.setup_dhcp(&dhcp_networks()).unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_manual_networking_writes_ifcfg() {
        let (runner, fs, arp, manager) = setup();
        add_interfaces(&fs);

        manager.setup_manual_networking(&manual_networks()).unwrap();

        let ifcfg = fs
            .contents("/etc/sysconfig/network-scripts/ifcfg-eth0")
            .unwrap();
        assert!(ifcfg.starts_with("DEVICE=eth0\nBOOTPROTO=static\n"));
        assert!(ifcfg.contains("IPADDR=10.0.0.5\n"));
        assert!(ifcfg.contains("GATEWAY=10.0.0.1\n"));
        assert!(ifcfg.ends_with("ONBOOT=yes\n"));

        assert_eq!(runner.rendered_commands(), vec!["service network restart"]);
        assert_eq!(arp.broadcasts.lock().len(), 1);
    }

    #[test]
    fn test_manual_networking_unknown_mac() {
        let (runner, fs, arp, manager) = setup();
        fs.add_file("/sys/class/net/eth0/address", "11:22:33:44:55:66\n");

        let err = manager
            .setup_manual_networking(&manual_networks())
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
        assert!(runner.commands().is_empty());
        assert!(arp.broadcasts.lock().is_empty());
    }
}
