//! dhclient configuration.

use super::{default_dns, Networks};

const DHCLIENT_HEADER: &str = "# Generated by bosh-agent

option rfc3442-classless-static-routes code 121 = array of unsigned integer 8;

send host-name \"<hostname>\";

request subnet-mask, broadcast-address, time-offset, routers,
\tdomain-name, domain-name-servers, domain-search, host-name,
\tnetbios-name-servers, netbios-scope, interface-mtu,
\trfc3442-classless-static-routes, ntp-servers;
";

/// Render dhclient.conf for `networks`.
///
/// DNS servers of the `dns` default network are prepended in reverse so the
/// first configured server ends up first in resolv.conf.
pub fn render_dhclient_config(networks: &Networks) -> String {
    let dns = default_dns(networks);
    let mut config = String::from(DHCLIENT_HEADER);

    if !dns.is_empty() {
        config.push('\n');
        for server in dns.iter().rev() {
            config.push_str(&format!("prepend domain-name-servers {};\n", server));
        }
    }
    config
}

#[cfg(test)]
pub(crate) const EXPECTED_DHCP_CONFIG: &str = "# Generated by bosh-agent

option rfc3442-classless-static-routes code 121 = array of unsigned integer 8;

send host-name \"<hostname>\";

request subnet-mask, broadcast-address, time-offset, routers,
\tdomain-name, domain-name-servers, domain-search, host-name,
\tnetbios-name-servers, netbios-scope, interface-mtu,
\trfc3442-classless-static-routes, ntp-servers;

prepend domain-name-servers zz.zz.zz.zz;
prepend domain-name-servers yy.yy.yy.yy;
prepend domain-name-servers xx.xx.xx.xx;
";
