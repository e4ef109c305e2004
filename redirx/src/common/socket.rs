use crate::interface::SocketValidator;
use anyhow::Result;
use std::fmt;
use tokio::net::TcpStream;

/// OS socket identifier as seen by the interception layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketHandle(pub i32);

impl SocketHandle {
    pub const INVALID: SocketHandle = SocketHandle(-1);

    /// Endpoint values embedded in connect buffers are pointer-sized, only the
    /// low 32 bits name the socket.
    pub fn from_endpoint(endpoint: u64) -> Self {
        SocketHandle((endpoint & 0xFFFF_FFFF) as u32 as i32)
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates handles against the host OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSockets;

impl SocketValidator for OsSockets {
    #[cfg(unix)]
    fn is_valid_socket(
        &self,
        socket: SocketHandle,
    ) -> bool {
        use nix::sys::stat::fstat;

        if socket.0 < 0 {
            return false;
        }

        match fstat(socket.0) {
            Ok(stat) => (stat.st_mode & libc::S_IFMT) == libc::S_IFSOCK,
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    fn is_valid_socket(
        &self,
        socket: SocketHandle,
    ) -> bool {
        use std::mem::ManuallyDrop;
        use std::os::windows::io::{FromRawSocket, RawSocket};

        if socket.0 < 0 {
            return false;
        }

        // SO_ERROR fails with WSAENOTSOCK for anything that is not a socket.
        let stream = ManuallyDrop::new(unsafe { std::net::TcpStream::from_raw_socket(socket.0 as u32 as RawSocket) });
        stream.take_error().is_ok()
    }
}

/// A tokio stream over a duplicate of a socket owned by someone else. The
/// duplicate is closed on drop and the original socket is put back into its
/// previous blocking mode.
pub struct BorrowedStream {
    stream: TcpStream,
    _mode: ModeGuard,
}

impl BorrowedStream {
    ///
    ///
    ///
    #[cfg(unix)]
    pub fn new(socket: SocketHandle) -> Result<Self> {
        use nix::fcntl::{fcntl, FcntlArg, OFlag};
        use nix::unistd::dup;
        use std::os::unix::io::FromRawFd;

        let flags = OFlag::from_bits_truncate(fcntl(socket.0, FcntlArg::F_GETFL)?);
        let mode = ModeGuard { socket, flags };

        let duplicate = dup(socket.0)?;
        let duplicate = unsafe { std::net::TcpStream::from_raw_fd(duplicate) };
        duplicate.set_nonblocking(true)?;

        let stream = TcpStream::from_std(duplicate)?;

        Ok(BorrowedStream { stream, _mode: mode })
    }

    ///
    ///
    ///
    #[cfg(windows)]
    pub fn new(socket: SocketHandle) -> Result<Self> {
        use std::mem::ManuallyDrop;
        use std::os::windows::io::{FromRawSocket, RawSocket};

        let original =
            ManuallyDrop::new(unsafe { std::net::TcpStream::from_raw_socket(socket.0 as u32 as RawSocket) });
        let mode = ModeGuard { socket };

        let duplicate = original.try_clone()?;
        duplicate.set_nonblocking(true)?;

        let stream = TcpStream::from_std(duplicate)?;

        Ok(BorrowedStream { stream, _mode: mode })
    }

    pub fn get_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[cfg(unix)]
struct ModeGuard {
    socket: SocketHandle,
    flags: nix::fcntl::OFlag,
}

#[cfg(unix)]
impl Drop for ModeGuard {
    fn drop(&mut self) {
        use nix::fcntl::{fcntl, FcntlArg};

        if let Err(error) = fcntl(self.socket.0, FcntlArg::F_SETFL(self.flags)) {
            warn!("Failed to restore mode of socket {}: {}", self.socket, error);
        }
    }
}

// Winsock cannot report the blocking mode, sockets are handed back blocking.
#[cfg(windows)]
struct ModeGuard {
    socket: SocketHandle,
}

#[cfg(windows)]
impl Drop for ModeGuard {
    fn drop(&mut self) {
        use std::mem::ManuallyDrop;
        use std::os::windows::io::{FromRawSocket, RawSocket};

        let original =
            ManuallyDrop::new(unsafe { std::net::TcpStream::from_raw_socket(self.socket.0 as u32 as RawSocket) });
        if let Err(error) = original.set_nonblocking(false) {
            warn!("Failed to restore mode of socket {}: {}", self.socket, error);
        }
    }
}
