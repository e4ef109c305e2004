use crate::constants::*;
use anyhow::Result;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// An address bound by the proxy, as read from a SOCKS reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Domainname { host: String, port: u16 },
    Ip(SocketAddr),
}

impl fmt::Display for Address {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Address::Domainname { host, port } => write!(f, "{}:{}", host, port),
            Address::Ip(socket_addr) => write!(f, "{}", socket_addr),
        }
    }
}

/// Encodes a destination as ATYP, address and port for a SOCKS request.
pub fn socks_bytes(addr: &SocketAddr) -> Vec<u8> {
    let mut bytes = vec![];

    match addr.ip() {
        IpAddr::V4(host) => {
            bytes.push(SOCKS_ATYP_IPV4);
            bytes.extend(host.octets().iter());
        }
        IpAddr::V6(host) => {
            bytes.push(SOCKS_ATYP_IPV6);
            bytes.extend(host.octets().iter());
        }
    }

    bytes.extend(addr.port().to_be_bytes().iter());
    bytes
}

///
///
///
pub async fn read_address<S>(stream: &mut S) -> Result<Address>
where
    S: AsyncRead + Unpin,
{
    // Read address type.
    let mut address_type = [0; 1];
    stream.read_exact(&mut address_type).await?;

    let address = match address_type[0] {
        SOCKS_ATYP_IPV4 => {
            let mut dst_addr = [0; 4];
            stream.read_exact(&mut dst_addr).await?;

            Some(IpAddr::from(dst_addr))
        }
        SOCKS_ATYP_IPV6 => {
            let mut dst_addr = [0; 16];
            stream.read_exact(&mut dst_addr).await?;

            Some(IpAddr::from(dst_addr))
        }
        SOCKS_ATYP_DOMAINNAME => None,
        address_type => bail!("Unsupported address type: {}.", address_type),
    };

    let address = match address {
        Some(host) => {
            let port = stream.read_u16().await?;
            Address::Ip(SocketAddr::new(host, port))
        }
        None => {
            let mut length = [0; 1];
            stream.read_exact(&mut length).await?;

            let mut host = vec![0; length[0] as usize];
            stream.read_exact(&mut host).await?;

            let host = String::from_utf8_lossy(&host[..]).to_string();
            let port = stream.read_u16().await?;

            Address::Domainname { host, port }
        }
    };

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_bytes() {
        let addr = "93.184.216.34:443".parse().unwrap();
        assert_eq!(socks_bytes(&addr), vec![SOCKS_ATYP_IPV4, 93, 184, 216, 34, 0x01, 0xBB]);
    }

    #[test]
    fn ipv6_bytes() {
        let addr = "[2001:db8::5]:8080".parse().unwrap();
        let bytes = socks_bytes(&addr);

        assert_eq!(bytes.len(), 1 + 16 + 2);
        assert_eq!(bytes[0], SOCKS_ATYP_IPV6);
        assert_eq!(&bytes[1..3], &[0x20, 0x01]);
        assert_eq!(&bytes[17..], &[0x1F, 0x90]);
    }

    #[tokio::test]
    async fn read_ipv6() {
        let mut data: &[u8] = &[
            SOCKS_ATYP_IPV6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0x04, 0x38,
        ];
        let address = read_address(&mut data).await.unwrap();

        assert_eq!(address, Address::Ip("[::1]:1080".parse().unwrap()));
    }

    #[tokio::test]
    async fn read_domainname() {
        let mut data: &[u8] = &[SOCKS_ATYP_DOMAINNAME, 5, b'p', b'r', b'o', b'x', b'y', 0x00, 0x50];
        let address = read_address(&mut data).await.unwrap();

        assert_eq!(address.to_string(), "proxy:80");
    }

    #[tokio::test]
    async fn unknown_address_type() {
        let mut data: &[u8] = &[0x07, 0, 0];
        assert!(read_address(&mut data).await.is_err());
    }
}
