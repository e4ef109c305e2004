use crate::sockaddr::AddressFamily;
use crate::SocketHandle;
use std::collections::TryReserveError;
use std::net::SocketAddr;
use thiserror::Error;

/// Why an intercepted connect request is left alone. The original connect
/// proceeds unmodified in every case.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("Unrecognized operation code: {0:#x}")]
    UnknownOperation(u32),

    #[error("Buffer is too short: needed {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Buffer has {extra} bytes after the destination address")]
    TrailingData { extra: usize },

    #[error("Neither handle {supplied} nor the embedded endpoint is a socket")]
    InvalidSocket { supplied: SocketHandle },

    #[error("Unsupported address family: {0}")]
    UnsupportedFamily(u16),

    #[error("No {0} proxy address is configured")]
    ProxyUnavailable(AddressFamily),

    #[error("Destination port {0} is the proxy port")]
    ProxyLoop(u16),

    #[error("Destination {0} is not reachable through the proxy")]
    Unreachable(SocketAddr),

    #[error("Failed to copy the connect buffer")]
    OutOfMemory,
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("Request is not eligible for redirection: {0}")]
    NotEligible(SkipReason),

    #[error("Request was already redirected")]
    AlreadyRedirected,

    #[error("No {0} proxy address is configured")]
    ProxyUnavailable(AddressFamily),

    #[error("Failed to allocate buffer: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Destination address is malformed: {0}")]
    MalformedDestination(anyhow::Error),

    #[error("SOCKS5 greeting failed: {0}")]
    Greeting(anyhow::Error),

    #[error("SOCKS5 connect request failed: {0}")]
    ConnectRequest(anyhow::Error),
}
