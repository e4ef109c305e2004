use crate::constants::*;
use crate::SocketHandle;
use bytes::Buf;

mod redirect;
mod request;

pub use redirect::{BlockingRedirector, Redirector, SpoofedBuffer};
pub use request::InterceptedRequest;

/// The connect ioctls that are intercepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Connect,
    SuperConnect,
}

impl Operation {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            IOCTL_AFD_CONNECT => Some(Operation::Connect),
            IOCTL_AFD_SUPER_CONNECT => Some(Operation::SuperConnect),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Operation::Connect => IOCTL_AFD_CONNECT,
            Operation::SuperConnect => IOCTL_AFD_SUPER_CONNECT,
        }
    }

    pub fn layout(self) -> &'static Layout {
        match self {
            Operation::Connect => &CONNECT_LAYOUT,
            Operation::SuperConnect => &SUPER_CONNECT_LAYOUT,
        }
    }
}

/// Field positions inside an ioctl input buffer (64-bit AFD structures).
#[derive(Debug)]
pub struct Layout {
    pub destination_offset: usize,
    pub endpoint_offset: Option<usize>,
}

// san_active: u64, root_endpoint: u64, connect_endpoint: u64, remote_address
const CONNECT_LAYOUT: Layout = Layout {
    destination_offset: 24,
    endpoint_offset: Some(16),
};

// san_active: u64, reserved: u64, remote_address
const SUPER_CONNECT_LAYOUT: Layout = Layout {
    destination_offset: 16,
    endpoint_offset: None,
};

impl Layout {
    /// The destination socket address and anything that follows it.
    pub fn destination<'a>(
        &self,
        data: &'a [u8],
    ) -> Option<&'a [u8]> {
        data.get(self.destination_offset..)
    }

    /// The endpoint handle embedded in the buffer, if this layout has one.
    pub fn endpoint(
        &self,
        data: &[u8],
    ) -> Option<SocketHandle> {
        let offset = self.endpoint_offset?;
        let mut field = data.get(offset..offset + 8)?;

        Some(SocketHandle::from_endpoint(field.get_u64_le()))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(Operation::from_code(0x12007), Some(Operation::Connect));
        assert_eq!(Operation::from_code(0x120C7), Some(Operation::SuperConnect));
        assert_eq!(Operation::from_code(0x12017), None);
        assert_eq!(Operation::SuperConnect.code(), IOCTL_AFD_SUPER_CONNECT);
    }

    #[test]
    fn connect_fields() {
        let data = connect_buffer(SocketHandle(0x1a4), "10.0.0.1:80");
        let layout = Operation::Connect.layout();

        assert_eq!(layout.endpoint(&data), Some(SocketHandle(0x1a4)));
        assert_eq!(layout.destination(&data).unwrap().len(), SOCKADDR_IN_LEN);
        assert_eq!(layout.destination(&data).unwrap()[0], AF_INET as u8);
    }

    #[test]
    fn super_connect_has_no_endpoint() {
        let data = super_connect_buffer("[::1]:80");
        let layout = Operation::SuperConnect.layout();

        assert_eq!(layout.endpoint(&data), None);
        assert_eq!(layout.destination(&data).unwrap().len(), SOCKADDR_IN6_LEN);
    }

    #[test]
    fn short_buffers() {
        let layout = Operation::Connect.layout();

        assert_eq!(layout.endpoint(&[0; 20]), None);
        assert_eq!(layout.destination(&[0; 20]), None);
        assert_eq!(layout.destination(&[0; 24]), Some(&[][..]));
    }
}
