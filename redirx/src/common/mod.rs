pub mod addresses;
pub mod constants;
pub mod credentials;
pub mod interface;
pub mod sockaddr;
pub mod socket;
pub mod util;
