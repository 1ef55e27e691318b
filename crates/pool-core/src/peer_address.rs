//! Network address record exchanged between peers.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pack::{read_bytes, read_u16_be, read_u64, Decode, Encode};

/// `services (u64) ‖ address (16 bytes) ‖ port (u16, big-endian)`.
///
/// IPv4 peers are carried as IPv4-mapped IPv6 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetAddress {
    pub services: u64,
    pub address: Ipv6Addr,
    pub port: u16,
}

impl NetAddress {
    pub fn new(services: u64, addr: SocketAddr) -> Self {
        let address = match addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        NetAddress {
            services,
            address,
            port: addr.port(),
        }
    }

    /// Socket address, unwrapping IPv4-mapped addresses.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = match self.address.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(self.address),
        };
        SocketAddr::new(ip, self.port)
    }
}

impl Encode for NetAddress {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u64_le(self.services);
        out.put_slice(&self.address.octets());
        out.put_u16(self.port);
        Ok(())
    }
}

impl Decode for NetAddress {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(NetAddress {
            services: read_u64(buf)?,
            address: Ipv6Addr::from(read_bytes::<16>(buf)?),
            port: read_u16_be(buf)?,
        })
    }
}
