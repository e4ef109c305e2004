use crate::addresses::{self, Address};
use crate::{constants::*, Credentials};
use anyhow::Result;
use num_traits::FromPrimitive;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

mod s5_handshake;
mod s5_probe;

pub use s5_handshake::Socks5Handshake;
pub use s5_probe::{Socks5Probe, DEFAULT_PROBE_TIMEOUT};

#[repr(u8)]
#[derive(Clone, Debug, FromPrimitive, PartialEq)]
pub enum Socks5Reply {
    Success = 0x00,
    GeneralFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TTLExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

/// Method selection, followed by username/password authentication when the
/// proxy asks for it.
///
/// [rfc1928] https://tools.ietf.org/html/rfc1928
pub async fn greet<S>(
    stream: &mut S,
    credentials: Option<&Credentials>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let auth_method = negotiate_auth_method(stream, credentials).await?;
    if auth_method == SOCKS_AUTH_USERNAME_PASSWORD {
        if let Some(credentials) = credentials {
            authenticate(stream, credentials).await?;
        }
    }

    Ok(())
}

///
///
///
pub async fn negotiate_auth_method<S>(
    stream: &mut S,
    credentials: Option<&Credentials>,
) -> Result<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = vec![SOCKS_VER_5, 0x01, SOCKS_AUTH_NOT_REQUIRED];
    if credentials.is_some() {
        request[1] = 0x02;
        request.push(SOCKS_AUTH_USERNAME_PASSWORD);
    }

    stream.write_all(&request).await?;

    let mut reply = [0; 2];
    stream.read_exact(&mut reply).await?;

    let socks_version = reply[0];
    if socks_version != SOCKS_VER_5 {
        bail!("Proxy uses a different SOCKS version: {}.", socks_version);
    }

    let auth_method = reply[1];
    match auth_method {
        SOCKS_AUTH_NOT_REQUIRED => Ok(auth_method),
        SOCKS_AUTH_USERNAME_PASSWORD => {
            if credentials.is_none() {
                bail!("Proxy demands authentication, but no credentials are provided.");
            } else {
                Ok(auth_method)
            }
        }
        SOCKS_AUTH_NO_ACCEPTABLE_METHODS => bail!("Proxy did not accept authentication method."),
        _ => bail!("Proxy proposed unsupported authentication method: {}.", auth_method),
    }
}

///
///
///
/// [rfc1929] https://tools.ietf.org/html/rfc1929
pub async fn authenticate<S>(
    stream: &mut S,
    credentials: &Credentials,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = vec![SOCKS_AUTH_VER];
    request.extend(credentials.as_socks_bytes()?);

    stream.write_all(&request).await?;

    let mut reply = [0; 2];
    stream.read_exact(&mut reply).await?;

    let auth_version = reply[0];
    if auth_version != SOCKS_AUTH_VER {
        bail!(
            "Proxy uses a different authentication method version: {}.",
            auth_version
        );
    }

    // Check if status indicates success. If not, bail to close the connection.
    let status = reply[1];
    if status != SOCKS_AUTH_SUCCESS {
        bail!("Authentication with the provided credentials failed.");
    }

    Ok(())
}

/// Sends a CONNECT request for `destination` and waits for the reply. Returns
/// the address the proxy bound for the connection.
pub async fn request_connect<S>(
    stream: &mut S,
    destination: &SocketAddr,
) -> Result<Address>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = vec![SOCKS_VER_5, SOCKS_CMD_CONNECT, SOCKS_RSV];
    request.extend(addresses::socks_bytes(destination));

    stream.write_all(&request).await?;
    stream.flush().await?;

    read_reply(stream).await
}

///
///
///
pub async fn read_reply<S>(stream: &mut S) -> Result<Address>
where
    S: AsyncRead + Unpin,
{
    let mut operation_reply = [0; 3];
    stream.read_exact(&mut operation_reply).await?;

    let socks_version = operation_reply[0];
    ensure!(
        socks_version == SOCKS_VER_5,
        "Proxy uses a different SOCKS version: {}.",
        socks_version
    );

    let reply_code = operation_reply[1];
    if reply_code != SOCKS_REP_SUCCEEDED {
        match Socks5Reply::from_u8(reply_code) {
            Some(reply) => bail!("CONNECT operation failed: {:?}.", reply),
            None => bail!("CONNECT operation failed: {}.", reply_code),
        }
    }

    let binding = addresses::read_address(stream).await?;

    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn greeting_without_credentials() {
        let (mut client, mut proxy) = duplex(64);

        let proxy = tokio::spawn(async move {
            let mut request = [0; 3];
            proxy.read_exact(&mut request).await.unwrap();
            proxy.write_all(&[SOCKS_VER_5, SOCKS_AUTH_NOT_REQUIRED]).await.unwrap();

            request
        });

        greet(&mut client, None).await.unwrap();
        assert_eq!(proxy.await.unwrap(), [0x05, 0x01, 0x00]);
    }

    #[tokio::test]
    async fn greeting_with_credentials() {
        let (mut client, mut proxy) = duplex(64);

        let proxy = tokio::spawn(async move {
            let mut request = [0; 4];
            proxy.read_exact(&mut request).await.unwrap();
            proxy.write_all(&[SOCKS_VER_5, SOCKS_AUTH_USERNAME_PASSWORD]).await.unwrap();

            let mut auth = [0; 9];
            proxy.read_exact(&mut auth).await.unwrap();
            proxy.write_all(&[SOCKS_AUTH_VER, SOCKS_AUTH_SUCCESS]).await.unwrap();

            (request, auth)
        });

        let credentials = Credentials::new("bob", "pwd");
        greet(&mut client, Some(&credentials)).await.unwrap();

        let (request, auth) = proxy.await.unwrap();
        assert_eq!(request, [0x05, 0x02, 0x00, 0x02]);
        assert_eq!(auth, [0x01, 3, b'b', b'o', b'b', 3, b'p', b'w', b'd']);
    }

    #[tokio::test]
    async fn rejected_methods() {
        let (mut client, mut proxy) = duplex(64);

        tokio::spawn(async move {
            let mut request = [0; 3];
            proxy.read_exact(&mut request).await.unwrap();
            proxy
                .write_all(&[SOCKS_VER_5, SOCKS_AUTH_NO_ACCEPTABLE_METHODS])
                .await
                .unwrap();
        });

        assert!(greet(&mut client, None).await.is_err());
    }

    #[tokio::test]
    async fn authentication_demanded_without_credentials() {
        let (mut client, mut proxy) = duplex(64);

        tokio::spawn(async move {
            let mut request = [0; 3];
            proxy.read_exact(&mut request).await.unwrap();
            proxy.write_all(&[SOCKS_VER_5, SOCKS_AUTH_USERNAME_PASSWORD]).await.unwrap();
        });

        assert!(greet(&mut client, None).await.is_err());
    }

    #[tokio::test]
    async fn connect_request_framing() {
        let (mut client, mut proxy) = duplex(64);

        let proxy = tokio::spawn(async move {
            let mut request = [0; 10];
            proxy.read_exact(&mut request).await.unwrap();
            proxy
                .write_all(&[SOCKS_VER_5, SOCKS_REP_SUCCEEDED, SOCKS_RSV, SOCKS_ATYP_IPV4, 127, 0, 0, 1, 0x9C, 0x40])
                .await
                .unwrap();

            request
        });

        let destination: SocketAddr = "93.184.216.34:443".parse().unwrap();
        let binding = request_connect(&mut client, &destination).await.unwrap();

        assert_eq!(
            proxy.await.unwrap(),
            [0x05, 0x01, 0x00, 0x01, 93, 184, 216, 34, 0x01, 0xBB]
        );
        assert_eq!(binding, Address::Ip("127.0.0.1:40000".parse().unwrap()));
    }

    #[tokio::test]
    async fn connect_request_ipv6() {
        let (mut client, mut proxy) = duplex(64);

        let proxy = tokio::spawn(async move {
            let mut request = vec![0; 22];
            proxy.read_exact(&mut request).await.unwrap();
            proxy
                .write_all(&[SOCKS_VER_5, SOCKS_REP_SUCCEEDED, SOCKS_RSV, SOCKS_ATYP_IPV4, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();

            request
        });

        let destination: SocketAddr = "[2001:db8::1]:80".parse().unwrap();
        request_connect(&mut client, &destination).await.unwrap();

        let request = proxy.await.unwrap();
        assert_eq!(&request[..4], &[0x05, 0x01, 0x00, 0x04]);
        assert_eq!(&request[20..], &[0x00, 0x50]);
    }

    #[tokio::test]
    async fn refused_connect() {
        let (mut client, mut proxy) = duplex(64);

        tokio::spawn(async move {
            let mut request = [0; 10];
            proxy.read_exact(&mut request).await.unwrap();
            proxy
                .write_all(&[SOCKS_VER_5, Socks5Reply::ConnectionRefused as u8, SOCKS_RSV, SOCKS_ATYP_IPV4, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let destination: SocketAddr = "10.1.2.3:22".parse().unwrap();
        let error = request_connect(&mut client, &destination).await.unwrap_err();

        assert!(error.to_string().contains("ConnectionRefused"));
    }
}
