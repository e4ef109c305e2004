pub const SOCKS_VER_5: u8 = 0x05u8;

pub const SOCKS_AUTH_VER: u8 = 0x01u8;
pub const SOCKS_AUTH_NOT_REQUIRED: u8 = 0x00u8;
pub const SOCKS_AUTH_USERNAME_PASSWORD: u8 = 0x02u8;
pub const SOCKS_AUTH_NO_ACCEPTABLE_METHODS: u8 = 0xFFu8;
pub const SOCKS_AUTH_SUCCESS: u8 = 0x00u8;

pub const SOCKS_CMD_CONNECT: u8 = 0x01u8;

pub const SOCKS_RSV: u8 = 0x00u8;

pub const SOCKS_ATYP_IPV4: u8 = 0x01u8;
pub const SOCKS_ATYP_DOMAINNAME: u8 = 0x03u8;
pub const SOCKS_ATYP_IPV6: u8 = 0x04u8;

pub const SOCKS_REP_SUCCEEDED: u8 = 0x00u8;

pub const IOCTL_AFD_CONNECT: u32 = 0x0001_2007u32;
pub const IOCTL_AFD_SUPER_CONNECT: u32 = 0x0001_20C7u32;

// Winsock values, the buffers are produced by AFD.
pub const AF_INET: u16 = 2u16;
pub const AF_INET6: u16 = 23u16;

pub const SOCKADDR_IN_LEN: usize = 16;
pub const SOCKADDR_IN6_LEN: usize = 28;

pub const DEFAULT_PROXY_IPV4: &str = "127.0.0.1";
pub const DEFAULT_PROXY_IPV6: &str = "::1";
pub const DEFAULT_PROXY_PORT: u16 = 55573u16;
