use crate::constants::*;
use crate::sockaddr::{self, AddressFamily, RawAddress};
use crate::Credentials;
use anyhow::{Context, Result};
use std::env;

/// Where intercepted connects are sent. Resolved once at startup and read-only
/// afterwards.
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    ipv4: Option<RawAddress>,
    ipv6: Option<RawAddress>,
    port: u16,
    probe_destination: bool,
    credentials: Option<Credentials>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::resolve(DEFAULT_PROXY_IPV4, DEFAULT_PROXY_IPV6, DEFAULT_PROXY_PORT)
    }
}

impl ProxyConfig {
    /// Builds the proxy addresses for both families. A host that does not
    /// resolve disables redirection for its family only.
    pub fn resolve(
        ipv4_host: &str,
        ipv6_host: &str,
        port: u16,
    ) -> Self {
        let ipv4 = resolve_family(ipv4_host, port, AddressFamily::Ipv4);
        let ipv6 = resolve_family(ipv6_host, port, AddressFamily::Ipv6);

        let describe = |addr: &Option<RawAddress>| match addr {
            Some(addr) => addr.to_string(),
            None => String::from("disabled"),
        };
        info!("Proxy configured: {} / {}", describe(&ipv4), describe(&ipv6));

        ProxyConfig {
            ipv4,
            ipv6,
            port,
            probe_destination: false,
            credentials: None,
        }
    }

    ///
    ///
    ///
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let ipv4_host = env::var("REDIRX_PROXY_IPV4").unwrap_or_else(|_| DEFAULT_PROXY_IPV4.to_string());
        let ipv6_host = env::var("REDIRX_PROXY_IPV6").unwrap_or_else(|_| DEFAULT_PROXY_IPV6.to_string());
        let port = match env::var("REDIRX_PROXY_PORT") {
            Ok(port) => port.parse().context("REDIRX_PROXY_PORT is not a port number")?,
            Err(_) => DEFAULT_PROXY_PORT,
        };
        let probe = match env::var("REDIRX_PROBE") {
            Ok(probe) => parse_flag(&probe).context("REDIRX_PROBE is not a boolean")?,
            Err(_) => false,
        };
        let credentials = credentials(env::var("REDIRX_USERNAME").ok(), env::var("REDIRX_PASSWORD").ok());

        Ok(Self::resolve(&ipv4_host, &ipv6_host, port)
            .with_probe(probe)
            .with_credentials(credentials))
    }

    /// Enables the reachability probe that runs before a request is accepted.
    pub fn with_probe(
        mut self,
        probe_destination: bool,
    ) -> Self {
        self.probe_destination = probe_destination;
        self
    }

    pub fn with_credentials(
        mut self,
        credentials: Option<Credentials>,
    ) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn proxy_address(
        &self,
        family: AddressFamily,
    ) -> Option<&RawAddress> {
        match family {
            AddressFamily::Ipv4 => self.ipv4.as_ref(),
            AddressFamily::Ipv6 => self.ipv6.as_ref(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn probe_destination(&self) -> bool {
        self.probe_destination
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// Pairs a username with its password. A password without a username is
/// dropped with a warning.
pub fn credentials(
    username: Option<String>,
    password: Option<String>,
) -> Option<Credentials> {
    match (username, password) {
        (Some(username), password) => Some(Credentials::new(username, password.unwrap_or_default())),
        (None, Some(_)) => {
            warn!("Proxy password is set without a username, authentication is disabled!");
            None
        }
        (None, None) => None,
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("Unrecognized value: {}.", other),
    }
}

fn resolve_family(
    host: &str,
    port: u16,
    family: AddressFamily,
) -> Option<RawAddress> {
    match sockaddr::build_address(host, port) {
        Ok(addr) if addr.family() == family => Some(addr),
        Ok(addr) => {
            warn!("Proxy address {} is not {}, {} proxy will not work!", addr, family, family);
            None
        }
        Err(error) => {
            warn!("Proxy address was not resolved, {} proxy will not work: {}", family, error);
            None
        }
    }
}
