use super::Operation;
use crate::error::{RedirectError, SkipReason};
use crate::interface::SocketValidator;
use crate::sockaddr::{self, AddressFamily};
use crate::{util, ProxyConfig, SocketHandle};
use num_traits::FromPrimitive;
use std::net::SocketAddr;

/// One observed connect attempt. Owns a private copy of the ioctl buffer when
/// the attempt is eligible for redirection, and nothing otherwise.
#[derive(Debug)]
pub struct InterceptedRequest {
    code: u32,
    operation: Option<Operation>,
    socket: SocketHandle,
    family: Option<AddressFamily>,
    buffer: Option<Box<[u8]>>,
    skip: Option<SkipReason>,
    redirected: bool,
}

/// The parts of an eligible request the redirect steps work on.
pub(super) struct Eligible<'a> {
    pub operation: Operation,
    pub family: AddressFamily,
    pub buffer: &'a [u8],
}

impl InterceptedRequest {
    /// Validates a connect ioctl. A request that fails any check is returned
    /// inert, with the reason available from `skip_reason`.
    pub fn new(
        code: u32,
        socket: SocketHandle,
        data: &[u8],
        config: &ProxyConfig,
        sockets: &dyn SocketValidator,
    ) -> Self {
        match Self::validate(code, socket, data, config, sockets) {
            Ok(request) => request,
            Err(reason) => {
                debug!("Ignoring connect {:#x} on socket {}: {}", code, socket, reason);
                InterceptedRequest {
                    code,
                    operation: Operation::from_code(code),
                    socket,
                    family: None,
                    buffer: None,
                    skip: Some(reason),
                    redirected: false,
                }
            }
        }
    }

    fn validate(
        code: u32,
        socket: SocketHandle,
        data: &[u8],
        config: &ProxyConfig,
        sockets: &dyn SocketValidator,
    ) -> Result<Self, SkipReason> {
        let operation = Operation::from_code(code).ok_or(SkipReason::UnknownOperation(code))?;
        let layout = operation.layout();

        let destination = layout
            .destination(data)
            .filter(|destination| destination.len() >= 2)
            .ok_or(SkipReason::Truncated {
                needed: layout.destination_offset + 2,
                actual: data.len(),
            })?;

        let socket = if sockets.is_valid_socket(socket) {
            socket
        } else {
            match layout.endpoint(data) {
                Some(endpoint) if sockets.is_valid_socket(endpoint) => endpoint,
                _ => return Err(SkipReason::InvalidSocket { supplied: socket }),
            }
        };

        let raw_family = sockaddr::raw_family(destination).map_err(|_| SkipReason::Truncated {
            needed: layout.destination_offset + 2,
            actual: data.len(),
        })?;
        let family = AddressFamily::from_u16(raw_family).ok_or(SkipReason::UnsupportedFamily(raw_family))?;

        let needed = layout.destination_offset + family.sockaddr_len();
        if data.len() < needed {
            return Err(SkipReason::Truncated {
                needed,
                actual: data.len(),
            });
        }
        if data.len() > needed {
            return Err(SkipReason::TrailingData {
                extra: data.len() - needed,
            });
        }

        if config.proxy_address(family).is_none() {
            return Err(SkipReason::ProxyUnavailable(family));
        }

        // Connects to the proxy itself must pass untouched, or we would loop.
        let port = sockaddr::port_of(destination).map_err(|_| SkipReason::Truncated {
            needed,
            actual: data.len(),
        })?;
        if port == config.port() {
            return Err(SkipReason::ProxyLoop(port));
        }

        let buffer = util::try_copy(data).map_err(|_| SkipReason::OutOfMemory)?;

        Ok(InterceptedRequest {
            code,
            operation: Some(operation),
            socket,
            family: Some(family),
            buffer: Some(buffer.into_boxed_slice()),
            skip: None,
            redirected: false,
        })
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// The socket the connect is issued on, after the endpoint fallback.
    pub fn socket(&self) -> SocketHandle {
        self.socket
    }

    pub fn address_family(&self) -> Option<AddressFamily> {
        self.family
    }

    pub fn raw_buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    pub fn raw_length(&self) -> usize {
        self.buffer.as_ref().map_or(0, |buffer| buffer.len())
    }

    pub fn is_valid(&self) -> bool {
        self.skip.is_none()
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        self.skip.as_ref()
    }

    pub fn is_redirected(&self) -> bool {
        self.redirected
    }

    /// The original destination, decoded.
    pub fn destination(&self) -> Option<SocketAddr> {
        let eligible = self.eligible().ok()?;
        let destination = eligible.operation.layout().destination(eligible.buffer)?;

        sockaddr::to_socket_addr(destination).ok()
    }

    pub(super) fn eligible(&self) -> Result<Eligible<'_>, RedirectError> {
        match (&self.skip, self.operation, self.family, &self.buffer) {
            (None, Some(operation), Some(family), Some(buffer)) => Ok(Eligible {
                operation,
                family,
                buffer,
            }),
            (Some(reason), ..) => Err(RedirectError::NotEligible(reason.clone())),
            _ => unreachable!("an eligible request always carries its buffer"),
        }
    }

    pub(super) fn mark_redirected(&mut self) {
        self.redirected = true;
    }

    /// Turns a valid request inert after a late check failed.
    pub(super) fn invalidate(
        &mut self,
        reason: SkipReason,
    ) {
        debug!("Ignoring connect {:#x} on socket {}: {}", self.code, self.socket, reason);

        self.family = None;
        self.buffer = None;
        self.skip = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::constants::*;

    pub struct FixedSockets(pub Vec<SocketHandle>);

    impl SocketValidator for FixedSockets {
        fn is_valid_socket(
            &self,
            socket: SocketHandle,
        ) -> bool {
            self.0.contains(&socket)
        }
    }

    const SOCKET: SocketHandle = SocketHandle(0x1f4);

    fn config() -> ProxyConfig {
        ProxyConfig::resolve("127.0.0.1", "::1", 55573)
    }

    fn sockets() -> FixedSockets {
        FixedSockets(vec![SOCKET])
    }

    #[test]
    fn valid_ipv4_connect() {
        let data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:443");
        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        assert!(request.is_valid());
        assert_eq!(request.skip_reason(), None);
        assert_eq!(request.operation(), Some(Operation::Connect));
        assert_eq!(request.address_family(), Some(AddressFamily::Ipv4));
        assert_eq!(request.socket(), SOCKET);
        assert_eq!(request.raw_length(), data.len());
        assert_eq!(request.destination(), Some("93.184.216.34:443".parse().unwrap()));
        assert!(!request.is_redirected());
    }

    #[test]
    fn valid_ipv6_super_connect() {
        let data = super_connect_buffer("[2606:2800:220:1::248]:443");
        let request = InterceptedRequest::new(IOCTL_AFD_SUPER_CONNECT, SOCKET, &data, &config(), &sockets());

        assert!(request.is_valid());
        assert_eq!(request.address_family(), Some(AddressFamily::Ipv6));
    }

    #[test]
    fn buffer_is_copied() {
        let mut data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:443");
        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        let original = data.clone();
        data.iter_mut().for_each(|b| *b = 0xEE);

        assert_eq!(request.raw_buffer(), Some(&original[..]));
    }

    #[test]
    fn unknown_operation_is_ignored() {
        let data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:443");
        let request = InterceptedRequest::new(0x12017, SOCKET, &data, &config(), &sockets());

        assert!(!request.is_valid());
        assert_eq!(request.skip_reason(), Some(&SkipReason::UnknownOperation(0x12017)));
        assert_eq!(request.operation(), None);
        assert_eq!(request.raw_buffer(), None);
        assert_eq!(request.raw_length(), 0);
        assert_eq!(request.address_family(), None);
    }

    #[test]
    fn proxy_port_is_ignored() {
        let data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:55573");
        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        assert!(!request.is_valid());
        assert_eq!(request.skip_reason(), Some(&SkipReason::ProxyLoop(55573)));
        assert_eq!(request.raw_buffer(), None);
    }

    #[test]
    fn falls_back_to_embedded_endpoint() {
        let endpoint = SocketHandle(0x2a8);
        let data = connect_buffer(endpoint, "93.184.216.34:443");
        let sockets = FixedSockets(vec![endpoint]);

        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SocketHandle(0x999), &data, &config(), &sockets);

        assert!(request.is_valid());
        assert_eq!(request.socket(), endpoint);
    }

    #[test]
    fn super_connect_has_no_fallback() {
        let data = super_connect_buffer("93.184.216.34:443");
        let supplied = SocketHandle(0x999);

        let request = InterceptedRequest::new(IOCTL_AFD_SUPER_CONNECT, supplied, &data, &config(), &sockets());

        assert_eq!(request.skip_reason(), Some(&SkipReason::InvalidSocket { supplied }));
    }

    #[test]
    fn no_valid_socket() {
        let data = connect_buffer(SocketHandle(0x2a8), "93.184.216.34:443");
        let supplied = SocketHandle(0x999);

        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, supplied, &data, &config(), &sockets());

        assert_eq!(request.skip_reason(), Some(&SkipReason::InvalidSocket { supplied }));
    }

    #[test]
    fn unsupported_family() {
        let mut data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:443");
        // AF_UNIX
        data[24] = 1;

        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        assert_eq!(request.skip_reason(), Some(&SkipReason::UnsupportedFamily(1)));
    }

    #[test]
    fn truncated_header() {
        let data = [0u8; 20];
        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        assert_eq!(
            request.skip_reason(),
            Some(&SkipReason::Truncated { needed: 26, actual: 20 })
        );
    }

    #[test]
    fn truncated_address() {
        let data = super_connect_buffer("[::1]:443");
        let data = &data[..30];
        let request = InterceptedRequest::new(IOCTL_AFD_SUPER_CONNECT, SOCKET, data, &config(), &sockets());

        assert_eq!(
            request.skip_reason(),
            Some(&SkipReason::Truncated { needed: 44, actual: 30 })
        );
    }

    #[test]
    fn bytes_after_destination() {
        let mut data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:443");
        data.extend(&[0xAB; 6]);

        let request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        assert_eq!(request.skip_reason(), Some(&SkipReason::TrailingData { extra: 6 }));
        assert!(request.raw_buffer().is_none());
    }

    #[test]
    fn unresolved_proxy_family() {
        let config = ProxyConfig::resolve("127.0.0.1", "bogus", 55573);
        let data = super_connect_buffer("[2606:2800:220:1::248]:443");

        let request = InterceptedRequest::new(IOCTL_AFD_SUPER_CONNECT, SOCKET, &data, &config, &sockets());

        assert_eq!(
            request.skip_reason(),
            Some(&SkipReason::ProxyUnavailable(AddressFamily::Ipv6))
        );
    }

    #[test]
    fn invalidate_releases_buffer() {
        let data = connect_buffer(SocketHandle::INVALID, "93.184.216.34:443");
        let mut request = InterceptedRequest::new(IOCTL_AFD_CONNECT, SOCKET, &data, &config(), &sockets());

        let destination = request.destination().unwrap();
        request.invalidate(SkipReason::Unreachable(destination));

        assert!(!request.is_valid());
        assert_eq!(request.raw_buffer(), None);
        assert_eq!(request.address_family(), None);
        assert!(matches!(request.eligible(), Err(RedirectError::NotEligible(_))));
    }
}
