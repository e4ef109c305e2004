use crate::interface::Handshake;
use crate::socket::{BorrowedStream, SocketHandle};
use crate::{socks5, Credentials};
use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

/// SOCKS5 client exchanges on a socket that is already connected to the
/// proxy, the socket itself stays with its owner.
#[derive(Clone, Debug, Default)]
pub struct Socks5Handshake {
    credentials: Option<Credentials>,
}

impl Socks5Handshake {
    ///
    ///
    ///
    pub fn new(credentials: Option<Credentials>) -> Self {
        Socks5Handshake { credentials }
    }
}

#[async_trait]
impl Handshake for Socks5Handshake {
    async fn greeting(
        &self,
        socket: SocketHandle,
    ) -> Result<()> {
        let mut stream = BorrowedStream::new(socket)?;
        socks5::greet(stream.get_mut(), self.credentials.as_ref()).await?;

        debug!("Greeted proxy on socket {}", socket);
        Ok(())
    }

    async fn connect_request(
        &self,
        socket: SocketHandle,
        destination: &SocketAddr,
    ) -> Result<()> {
        let mut stream = BorrowedStream::new(socket)?;
        let binding = socks5::request_connect(stream.get_mut(), destination).await?;

        debug!("Proxy bound {} for {} on socket {}", binding, destination, socket);
        Ok(())
    }
}
