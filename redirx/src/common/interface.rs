use crate::SocketHandle;
use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

pub trait SocketValidator {
    fn is_valid_socket(
        &self,
        socket: SocketHandle,
    ) -> bool;
}

/// The two SOCKS5 exchanges that follow a connect to the proxy. Both run on
/// the socket that performed the connect.
#[async_trait]
pub trait Handshake {
    async fn greeting(
        &self,
        socket: SocketHandle,
    ) -> Result<()>;

    async fn connect_request(
        &self,
        socket: SocketHandle,
        destination: &SocketAddr,
    ) -> Result<()>;
}

#[async_trait]
pub trait ReachabilityProbe {
    async fn probe_reachable(
        &self,
        destination: &SocketAddr,
        proxy: &SocketAddr,
    ) -> bool;
}
