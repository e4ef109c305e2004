use super::InterceptedRequest;
use crate::error::{RedirectError, SkipReason};
use crate::interface::{Handshake, ReachabilityProbe, SocketValidator};
use crate::sockaddr::{self, RawAddress};
use crate::socks5::{Socks5Handshake, Socks5Probe, DEFAULT_PROBE_TIMEOUT};
use crate::{OsSockets, ProxyConfig, SocketHandle};
use std::collections::TryReserveError;
use std::fmt;
use std::io;
use std::ops::Deref;
use tokio::runtime::{self, Runtime};

/// Replacement ioctl input pointing the connect at the proxy. Owned by the
/// caller and released when dropped, after the substituted connect is done.
#[derive(Clone, PartialEq, Eq)]
pub struct SpoofedBuffer {
    data: Vec<u8>,
}

impl SpoofedBuffer {
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for SpoofedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for SpoofedBuffer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "SpoofedBuffer({} bytes)", self.data.len())
    }
}

impl InterceptedRequest {
    /// Copies the original buffer with the destination replaced by the proxy
    /// address of the same family.
    pub fn spoofed_buffer(
        &self,
        config: &ProxyConfig,
    ) -> Result<SpoofedBuffer, RedirectError> {
        if self.is_redirected() {
            return Err(RedirectError::AlreadyRedirected);
        }

        let eligible = self.eligible()?;
        let proxy = config
            .proxy_address(eligible.family)
            .ok_or(RedirectError::ProxyUnavailable(eligible.family))?;

        // The destination is always the last field of an eligible buffer.
        let base_length = eligible.buffer.len() - eligible.family.sockaddr_len();

        let mut data = Vec::new();
        data.try_reserve_exact(base_length + proxy.len())?;
        data.extend_from_slice(&eligible.buffer[..base_length]);
        data.extend_from_slice(proxy.as_bytes());

        Ok(SpoofedBuffer { data })
    }

    /// A fresh copy of the destination socket address from the original buffer.
    pub fn original_destination(&self) -> Result<RawAddress, RedirectError> {
        let eligible = self.eligible()?;
        let offset = eligible.operation.layout().destination_offset;

        RawAddress::from_bytes(&eligible.buffer[offset..]).map_err(|error| match error.downcast::<TryReserveError>() {
            Ok(error) => RedirectError::Allocation(error),
            Err(error) => RedirectError::MalformedDestination(error),
        })
    }

    /// Tells the proxy the original destination. The substituted connect must
    /// have completed on `socket()`. Blocks the task for the whole exchange and
    /// is never retried; on failure the socket should be closed.
    pub async fn run_handshake<H>(
        &mut self,
        handshake: &H,
    ) -> Result<(), RedirectError>
    where
        H: Handshake + Sync + ?Sized,
    {
        if self.is_redirected() {
            return Err(RedirectError::AlreadyRedirected);
        }

        let destination = {
            let eligible = self.eligible()?;
            let offset = eligible.operation.layout().destination_offset;

            sockaddr::to_socket_addr(&eligible.buffer[offset..]).map_err(RedirectError::MalformedDestination)?
        };
        let socket = self.socket();

        if let Err(error) = handshake.greeting(socket).await {
            warn!("SOCKS5 greeting on socket {} failed: {}", socket, error);
            return Err(RedirectError::Greeting(error));
        }

        if let Err(error) = handshake.connect_request(socket, &destination).await {
            warn!("SOCKS5 connect to {} on socket {} failed: {}", destination, socket, error);
            return Err(RedirectError::ConnectRequest(error));
        }

        self.mark_redirected();
        debug!("Socket {} redirected to {} through proxy", socket, destination);

        Ok(())
    }
}

/// Proxy configuration plus the collaborators the redirect steps need.
pub struct Redirector {
    config: ProxyConfig,
    sockets: Box<dyn SocketValidator + Send + Sync>,
    handshake: Box<dyn Handshake + Send + Sync>,
    probe: Box<dyn ReachabilityProbe + Send + Sync>,
}

impl Redirector {
    ///
    ///
    ///
    pub fn new(config: ProxyConfig) -> Self {
        let credentials = config.credentials().cloned();

        Redirector {
            handshake: Box::new(Socks5Handshake::new(credentials.clone())),
            probe: Box::new(Socks5Probe::new(credentials, DEFAULT_PROBE_TIMEOUT)),
            sockets: Box::new(OsSockets),
            config,
        }
    }

    pub fn with_sockets<V>(
        mut self,
        sockets: V,
    ) -> Self
    where
        V: SocketValidator + Send + Sync + 'static,
    {
        self.sockets = Box::new(sockets);
        self
    }

    pub fn with_handshake<H>(
        mut self,
        handshake: H,
    ) -> Self
    where
        H: Handshake + Send + Sync + 'static,
    {
        self.handshake = Box::new(handshake);
        self
    }

    pub fn with_probe<P>(
        mut self,
        probe: P,
    ) -> Self
    where
        P: ReachabilityProbe + Send + Sync + 'static,
    {
        self.probe = Box::new(probe);
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Builds the request for an observed connect and, when enabled, probes the
    /// destination through the proxy before accepting it.
    pub async fn intercept(
        &self,
        code: u32,
        socket: SocketHandle,
        data: &[u8],
    ) -> InterceptedRequest {
        let mut request = InterceptedRequest::new(code, socket, data, &self.config, self.sockets.as_ref());
        if !request.is_valid() || !self.config.probe_destination() {
            return request;
        }

        let proxy = request
            .address_family()
            .and_then(|family| self.config.proxy_address(family))
            .map(RawAddress::to_socket_addr);

        if let (Some(destination), Some(proxy)) = (request.destination(), proxy) {
            if !self.probe.probe_reachable(&destination, &proxy).await {
                request.invalidate(SkipReason::Unreachable(destination));
            }
        }

        request
    }

    pub fn spoofed_buffer(
        &self,
        request: &InterceptedRequest,
    ) -> Result<SpoofedBuffer, RedirectError> {
        request.spoofed_buffer(&self.config)
    }

    pub async fn run_handshake(
        &self,
        request: &mut InterceptedRequest,
    ) -> Result<(), RedirectError> {
        request.run_handshake(self.handshake.as_ref()).await
    }
}

/// Synchronous front for interception hooks that cannot await.
pub struct BlockingRedirector {
    inner: Redirector,
    runtime: Runtime,
}

impl BlockingRedirector {
    ///
    ///
    ///
    pub fn new(inner: Redirector) -> io::Result<Self> {
        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;

        Ok(BlockingRedirector { inner, runtime })
    }

    pub fn config(&self) -> &ProxyConfig {
        self.inner.config()
    }

    pub fn intercept(
        &self,
        code: u32,
        socket: SocketHandle,
        data: &[u8],
    ) -> InterceptedRequest {
        self.runtime.block_on(self.inner.intercept(code, socket, data))
    }

    pub fn spoofed_buffer(
        &self,
        request: &InterceptedRequest,
    ) -> Result<SpoofedBuffer, RedirectError> {
        self.inner.spoofed_buffer(request)
    }

    pub fn run_handshake(
        &self,
        request: &mut InterceptedRequest,
    ) -> Result<(), RedirectError> {
        self.runtime.block_on(self.inner.run_handshake(request))
    }
}
