use crate::interface::ReachabilityProbe;
use crate::{socks5, Credentials};
use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks that a destination can be reached through the proxy by opening a
/// separate proxied connection to it. The probe is visible to the
/// destination.
#[derive(Clone, Debug)]
pub struct Socks5Probe {
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl Default for Socks5Probe {
    fn default() -> Self {
        Self::new(None, DEFAULT_PROBE_TIMEOUT)
    }
}

impl Socks5Probe {
    ///
    ///
    ///
    pub fn new(
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Self {
        Socks5Probe { credentials, timeout }
    }

    async fn connect(
        &self,
        destination: &SocketAddr,
        proxy: &SocketAddr,
    ) -> Result<()> {
        let mut stream = TcpStream::connect(proxy).await?;

        socks5::greet(&mut stream, self.credentials.as_ref()).await?;
        socks5::request_connect(&mut stream, destination).await?;

        Ok(())
    }
}

#[async_trait]
impl ReachabilityProbe for Socks5Probe {
    async fn probe_reachable(
        &self,
        destination: &SocketAddr,
        proxy: &SocketAddr,
    ) -> bool {
        match time::timeout(self.timeout, self.connect(destination, proxy)).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                debug!("Probe of {} via {} failed: {}", destination, proxy, error);
                false
            }
            Err(_) => {
                debug!("Probe of {} via {} timed out", destination, proxy);
                false
            }
        }
    }
}
