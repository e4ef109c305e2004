#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;
#[macro_use]
extern crate num_derive;

mod afd;
mod common;
pub mod config;
mod error;
pub mod socks5;

pub use afd::{BlockingRedirector, InterceptedRequest, Layout, Operation, Redirector, SpoofedBuffer};
pub use common::credentials::Credentials;
pub use common::socket::{BorrowedStream, OsSockets, SocketHandle};
pub use common::{addresses, constants, interface, sockaddr, socket, util};
pub use config::ProxyConfig;
pub use error::{RedirectError, SkipReason};
pub use socks5::{Socks5Handshake, Socks5Probe};
