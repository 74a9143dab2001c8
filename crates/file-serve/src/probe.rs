//! Find the address other machines on the LAN can reach us at

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Reported when no better address can be determined
pub const FALLBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A strategy for discovering this machine's LAN address
pub trait AddressProbe {
    fn probe(&self) -> std::io::Result<IpAddr>;
}

/// Ask the routing table which local address would be used to reach `target`
///
/// Connecting a UDP socket only selects a route, no packet is ever sent, so any routable
/// address works as a target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpProbe {
    target: SocketAddr,
    timeout: Duration,
}

impl UdpProbe {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            timeout: Duration::from_secs(1),
        }
    }
}

impl Default for UdpProbe {
    fn default() -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80))
    }
}

impl AddressProbe for UdpProbe {
    fn probe(&self) -> std::io::Result<IpAddr> {
        let unspecified = match self.target {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.set_write_timeout(Some(self.timeout))?;
        socket.connect(self.target)?;
        Ok(socket.local_addr()?.ip())
    }
}

/// Best guess at this machine's LAN address, [`FALLBACK`] if there is none
pub fn discover_local_address() -> IpAddr {
    discover_with(&UdpProbe::default())
}

/// Like [`discover_local_address`] with a custom strategy
pub fn discover_with(probe: &dyn AddressProbe) -> IpAddr {
    match probe.probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(ip) => {
            log::debug!("Address probe returned {ip}, falling back to {FALLBACK}");
            FALLBACK
        }
        Err(err) => {
            log::debug!("Address probe failed, falling back to {FALLBACK}: {err}");
            FALLBACK
        }
    }
}
