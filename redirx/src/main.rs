#[macro_use]
extern crate human_panic;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::LevelFilter;
use redirx::constants::*;
use redirx::interface::{ReachabilityProbe, SocketValidator};
use redirx::sockaddr::AddressFamily;
use redirx::{config, util, InterceptedRequest, OsSockets, ProxyConfig, SocketHandle, Socks5Probe};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"), about = "Inspects and tests transparent SOCKS5 redirection")]
struct Args {
    /// Prints debug information verbosely
    #[clap(short, long)]
    debug: bool,

    /// IPv4 address of the local proxy
    #[clap(long, env = "REDIRX_PROXY_IPV4", default_value = DEFAULT_PROXY_IPV4)]
    ipv4: String,

    /// IPv6 address of the local proxy
    #[clap(long, env = "REDIRX_PROXY_IPV6", default_value = DEFAULT_PROXY_IPV6)]
    ipv6: String,

    /// Port of the local proxy
    #[clap(short, long, env = "REDIRX_PROXY_PORT", default_value_t = DEFAULT_PROXY_PORT)]
    port: u16,

    /// Username for the proxy, if it requires authentication
    #[clap(long, env = "REDIRX_USERNAME")]
    username: Option<String>,

    #[clap(long, env = "REDIRX_PASSWORD")]
    password: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shows the redirect decision for a captured connect buffer
    Inspect {
        /// Ioctl code the buffer was captured with
        #[clap(short, long, parse(try_from_str = parse_code), default_value = "0x12007")]
        code: u32,

        /// Socket handle the connect was issued on
        #[clap(short, long, default_value = "-1")]
        socket: i32,

        /// Accept the socket handle without asking the OS
        #[clap(long)]
        assume_socket: bool,

        /// File holding the raw ioctl input buffer
        file: PathBuf,
    },
    /// Checks that a destination is reachable through the proxy
    Probe {
        destination: SocketAddr,

        /// Seconds to wait for the proxy
        #[clap(short, long, default_value = "5")]
        timeout: u64,
    },
}

struct AssumeValid(SocketHandle);

impl SocketValidator for AssumeValid {
    fn is_valid_socket(
        &self,
        socket: SocketHandle,
    ) -> bool {
        socket == self.0
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);

    if args.debug {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();

        setup_panic!(Metadata {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            authors: env!("CARGO_PKG_AUTHORS").replace(":", ", ").into(),
            homepage: env!("CARGO_PKG_HOMEPAGE").into(),
        });
    }

    let credentials = config::credentials(args.username, args.password);
    let config = ProxyConfig::resolve(&args.ipv4, &args.ipv6, args.port).with_credentials(credentials);

    match args.command {
        Command::Inspect {
            code,
            socket,
            assume_socket,
            file,
        } => inspect(&config, code, SocketHandle(socket), assume_socket, file),
        Command::Probe { destination, timeout } => probe(&config, destination, timeout).await,
    }
}

///
///
///
fn inspect(
    config: &ProxyConfig,
    code: u32,
    socket: SocketHandle,
    assume_socket: bool,
    file: PathBuf,
) -> Result<()> {
    let data = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;

    let request = if assume_socket {
        InterceptedRequest::new(code, socket, &data, config, &AssumeValid(socket))
    } else {
        InterceptedRequest::new(code, socket, &data, config, &OsSockets)
    };

    if let Some(reason) = request.skip_reason() {
        println!("ignored: {}", reason);
        return Ok(());
    }

    let original = request.original_destination()?;
    let spoofed = request.spoofed_buffer(config)?;

    if let Some(operation) = request.operation() {
        println!("operation:   {:?} ({:#x})", operation, operation.code());
    }
    println!("socket:      {}", request.socket());
    println!("destination: {}", original);
    println!("original:    {}", util::to_hex(request.raw_buffer().unwrap_or_default()));
    println!("spoofed:     {}", util::to_hex(&spoofed));

    Ok(())
}

///
///
///
async fn probe(
    config: &ProxyConfig,
    destination: SocketAddr,
    timeout: u64,
) -> Result<()> {
    let family = AddressFamily::of(&destination);
    let proxy = config
        .proxy_address(family)
        .with_context(|| format!("No {} proxy address is configured.", family))?
        .to_socket_addr();

    let probe = Socks5Probe::new(config.credentials().cloned(), Duration::from_secs(timeout));
    if probe.probe_reachable(&destination, &proxy).await {
        println!("{} is reachable through {}", destination, proxy);
        Ok(())
    } else {
        bail!("{} is not reachable through {}.", destination, proxy)
    }
}

fn parse_code(code: &str) -> Result<u32> {
    let code = match code.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => code.parse()?,
    };

    Ok(code)
}
