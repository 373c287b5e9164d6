use crate::error::PreviewError;
use ip_network::{IpNetwork, Ipv6Network};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Decides which resolved addresses may be connected to.
///
/// A whitelisted network always wins. Otherwise a blacklisted network denies,
/// and anything left over is allowed only when it is a global unicast address.
#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    blacklist: Vec<IpNetwork>,
    whitelist: Vec<IpNetwork>,
}

impl AddressFilter {
    pub fn new(blacklist: Vec<IpNetwork>, whitelist: Vec<IpNetwork>) -> Self {
        Self {
            blacklist,
            whitelist,
        }
    }

    /// Builds a filter from CIDR strings such as `10.0.0.0/8` or `fc00::/7`.
    pub fn from_cidrs<S: AsRef<str>>(blacklist: &[S], whitelist: &[S]) -> Result<Self, PreviewError> {
        Ok(Self::new(parse_networks(blacklist)?, parse_networks(whitelist)?))
    }

    /// Lists match either the address itself or the IPv4 address an IPv6
    /// address carries.
    pub fn is_allowed(&self, addr: IpAddr) -> bool {
        let embedded = match addr {
            IpAddr::V6(v6) => embedded_ipv4(&v6).map(IpAddr::V4),
            IpAddr::V4(_) => None,
        };
        let listed = |nets: &[IpNetwork]| {
            nets.iter()
                .any(|net| net.contains(addr) || embedded.is_some_and(|v4| net.contains(v4)))
        };

        if listed(&self.whitelist) {
            return true;
        }

        if listed(&self.blacklist) {
            return false;
        }

        is_global_unicast(addr)
    }

    /// Splits addresses into the allowed ones and a flag telling whether any
    /// address was rejected. Order is preserved.
    pub fn partition(&self, addrs: &[IpAddr]) -> (Vec<IpAddr>, bool) {
        let mut filtered = false;
        let mut allowed = Vec::with_capacity(addrs.len());

        for addr in addrs {
            if self.is_allowed(*addr) {
                allowed.push(*addr);
            } else {
                filtered = true;
            }
        }

        (allowed, filtered)
    }
}

pub(crate) fn parse_networks<S: AsRef<str>>(cidrs: &[S]) -> Result<Vec<IpNetwork>, PreviewError> {
    cidrs
        .iter()
        .map(|cidr| {
            let cidr = cidr.as_ref().trim();
            cidr.parse::<IpNetwork>()
                .map_err(|e| PreviewError::ConfigError(format!("invalid network {cidr}: {e}")))
        })
        .collect()
}

/// Wraps a single address into a host-sized network.
pub(crate) fn host_network(addr: IpAddr) -> Result<IpNetwork, PreviewError> {
    let prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNetwork::new(addr, prefix)
        .map_err(|e| PreviewError::ConfigError(format!("invalid address {addr}: {e}")))
}

/// IPv4 address carried inside an IPv6 one: IPv4-mapped (`::ffff:a.b.c.d`),
/// IPv4-compatible (`::a.b.c.d`), NAT64 (`64:ff9b::/96`) or 6to4 (`2002::/16`).
fn embedded_ipv4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }

    let s = ip.segments();
    let join = |hi: u16, lo: u16| Ipv4Addr::from((u32::from(hi) << 16) | u32::from(lo));

    match s {
        [0, 0, 0, 0, 0, 0, hi, lo] => Some(join(hi, lo)),
        [0x64, 0xff9b, 0, 0, 0, 0, hi, lo] => Some(join(hi, lo)),
        [0x2002, hi, lo, ..] => Some(join(hi, lo)),
        _ => None,
    }
}

/// Returns true for addresses routable on the public internet.
///
/// IPv6 addresses that carry an IPv4 address are judged by that address.
pub fn is_global_unicast(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(ipv4) => is_global_ipv4(&ipv4),
        IpAddr::V6(ipv6) => match embedded_ipv4(&ipv6) {
            Some(ipv4) => is_global_ipv4(&ipv4),
            None => {
                let network = Ipv6Network::from(ipv6);
                !(ipv6.is_multicast()
                    || network.is_unicast_link_local()
                    || network.is_unique_local())
            }
        },
    }
}

fn is_global_ipv4(ip: &Ipv4Addr) -> bool {
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_broadcast()
        || is_ipv4_reserved(ip))
}

fn is_ipv4_reserved(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 0.0.0.0/8
    octets[0] == 0
        // 100.64.0.0/10 (Carrier-grade NAT)
        || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
        // 240.0.0.0/4 (Reserved)
        || (octets[0] & 0b1111_0000) == 0b1111_0000
}
