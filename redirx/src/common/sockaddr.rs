use crate::constants::*;
use crate::util;
use anyhow::Result;
use bytes::{Buf, BufMut};
use num_traits::FromPrimitive;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

#[repr(u16)]
#[derive(Clone, Copy, Debug, FromPrimitive, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4 = 2,
    Ipv6 = 23,
}

impl AddressFamily {
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Size of the raw socket address for this family.
    pub fn sockaddr_len(self) -> usize {
        match self {
            AddressFamily::Ipv4 => SOCKADDR_IN_LEN,
            AddressFamily::Ipv6 => SOCKADDR_IN6_LEN,
        }
    }

    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Reads the family field of a raw socket address without interpreting it.
pub fn raw_family(raw: &[u8]) -> Result<u16> {
    ensure!(raw.len() >= 2, "Address is too short to hold a family: {} bytes.", raw.len());

    Ok((&raw[..2]).get_u16_le())
}

///
///
///
pub fn address_family_of(raw: &[u8]) -> Result<AddressFamily> {
    let family = raw_family(raw)?;

    AddressFamily::from_u16(family).ok_or_else(|| anyhow!("Unsupported address family: {}.", family))
}

///
///
///
pub fn port_of(raw: &[u8]) -> Result<u16> {
    ensure!(raw.len() >= 4, "Address is too short to hold a port: {} bytes.", raw.len());

    Ok((&raw[2..4]).get_u16())
}

/// Decodes a raw `sockaddr_in` or `sockaddr_in6`.
pub fn to_socket_addr(raw: &[u8]) -> Result<SocketAddr> {
    let family = address_family_of(raw)?;
    let length = family.sockaddr_len();
    ensure!(
        raw.len() >= length,
        "{} address needs {} bytes, got {}.",
        family,
        length,
        raw.len()
    );

    let mut raw = &raw[2..length];
    let port = raw.get_u16();

    let addr = match family {
        AddressFamily::Ipv4 => {
            let mut host = [0; 4];
            raw.copy_to_slice(&mut host);

            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(host), port))
        }
        AddressFamily::Ipv6 => {
            let flowinfo = raw.get_u32();
            let mut host = [0; 16];
            raw.copy_to_slice(&mut host);
            let scope_id = raw.get_u32_le();

            SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(host), port, flowinfo, scope_id))
        }
    };

    Ok(addr)
}

/// Builds the raw socket address for an IP literal and port. Host names are
/// not resolved.
pub fn build_address(
    host: &str,
    port: u16,
) -> Result<RawAddress> {
    let host: IpAddr = match host.parse() {
        Ok(host) => host,
        Err(_) => bail!("Proxy host must be an IP literal: {}.", host),
    };

    Ok(RawAddress::encode(&SocketAddr::new(host, port)))
}

/// An owned raw socket address of one of the supported families.
#[derive(Clone, PartialEq, Eq)]
pub struct RawAddress {
    addr: SocketAddr,
    bytes: Vec<u8>,
}

impl RawAddress {
    ///
    ///
    ///
    pub fn encode(addr: &SocketAddr) -> Self {
        let family = AddressFamily::of(addr);

        let mut bytes = Vec::with_capacity(family.sockaddr_len());
        bytes.put_u16_le(family.raw());
        bytes.put_u16(addr.port());

        match addr {
            SocketAddr::V4(addr) => {
                bytes.put_slice(&addr.ip().octets());
                bytes.put_slice(&[0; 8]);
            }
            SocketAddr::V6(addr) => {
                bytes.put_u32(addr.flowinfo());
                bytes.put_slice(&addr.ip().octets());
                bytes.put_u32_le(addr.scope_id());
            }
        }

        RawAddress { addr: *addr, bytes }
    }

    /// Copies exactly one socket address from the start of `raw`.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let addr = to_socket_addr(raw)?;
        let length = AddressFamily::of(&addr).sockaddr_len();
        let bytes = util::try_copy(&raw[..length])?;

        Ok(RawAddress { addr, bytes })
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.addr)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for RawAddress {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for RawAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "RawAddress({})", self.addr)
    }
}

impl fmt::Display for RawAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}
