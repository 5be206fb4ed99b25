//! TCP socket wrappers for the risk gate.
//!
//! Thin wrappers around socket2 that move whole frames: the protocol
//! assumes one `recv` returns one complete message and one `send` writes
//! one complete message. The receive buffer is pre-allocated so steady
//! state reads never allocate.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{SocketAddr, ToSocketAddrs};

/// Receive buffer size; caps the length of a single frame (64KB).
const BUFFER_SIZE: usize = 65536;

/// Listen backlog length.
const BACKLOG: i32 = 128;

fn resolve(addr: &str, port: u16) -> io::Result<SocketAddr> {
    (addr, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))
}

fn domain_for(addr: &SocketAddr) -> Domain {
    if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    }
}

/// A connected TCP socket owning its descriptor.
///
/// The descriptor is closed exactly once when the socket is dropped;
/// moves transfer ownership and there is no way to copy the handle.
pub struct TcpSocket {
    socket: Socket,
    recv_buffer: Box<[MaybeUninit<u8>]>,
}

impl TcpSocket {
    fn from_socket(socket: Socket) -> Self {
        Self {
            socket,
            recv_buffer: vec![MaybeUninit::uninit(); BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Connects to a remote address.
    pub fn connect(addr: &str, port: u16) -> io::Result<Self> {
        let socket_addr = resolve(addr, port)?;
        let socket = Socket::new(domain_for(&socket_addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        socket.connect(&socket_addr.into())?;
        Ok(Self::from_socket(socket))
    }

    /// Receives one frame (blocking).
    ///
    /// An empty slice means the peer performed an orderly close.
    pub fn recv(&mut self) -> io::Result<&[u8]> {
        let n = self.socket.recv(&mut self.recv_buffer)?;
        // SAFETY: recv() guarantees the first n bytes are initialized
        Ok(unsafe { std::slice::from_raw_parts(self.recv_buffer.as_ptr() as *const u8, n) })
    }

    /// Sends one frame; returns the number of bytes written.
    pub fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data)
    }

    /// Address of the local end of the connection.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        as_inet_addr(self.socket.local_addr()?)
    }
}

/// A TCP listener that accepts incoming connections.
pub struct TcpListener {
    listener: Socket,
}

impl TcpListener {
    /// Binds to the specified address and starts listening.
    pub fn bind(addr: &str, port: u16) -> io::Result<Self> {
        let socket_addr = resolve(addr, port)?;
        let listener = Socket::new(domain_for(&socket_addr), Type::STREAM, Some(Protocol::TCP))?;

        // SO_REUSEADDR for quick rebinding after restarts
        listener.set_reuse_address(true)?;
        listener.bind(&socket_addr.into())?;
        listener.listen(BACKLOG)?;

        Ok(Self { listener })
    }

    /// Blocks until a client connects, then returns its socket.
    pub fn accept(&self) -> io::Result<TcpSocket> {
        let (socket, _addr) = self.listener.accept()?;
        socket.set_nodelay(true)?;
        Ok(TcpSocket::from_socket(socket))
    }

    /// Sets the listener to non-blocking or blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.listener.set_nonblocking(nonblocking)
    }

    /// Address the listener is bound to; the port is the one the OS
    /// picked when binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        as_inet_addr(self.listener.local_addr()?)
    }
}

fn as_inet_addr(addr: socket2::SockAddr) -> io::Result<SocketAddr> {
    addr.as_socket()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "not an inet address"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_listener_bind() {
        // Port 0 lets the OS assign an available port
        let listener = TcpListener::bind("127.0.0.1", 0);
        assert!(listener.is_ok());
    }

    #[test]
    fn test_listener_local_addr() {
        let listener = TcpListener::bind("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_listener_nonblocking() {
        let listener = TcpListener::bind("127.0.0.1", 0).unwrap();
        assert!(listener.set_nonblocking(true).is_ok());
        assert!(listener.set_nonblocking(false).is_ok());
    }

    #[test]
    fn test_send_recv_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = thread::spawn(move || {
            let mut socket = TcpSocket::connect("127.0.0.1", port).unwrap();
            socket.send(b"1 2 3 4").unwrap();
            let reply = socket.recv().unwrap();
            assert_eq!(reply, b"5 6 7 8");
        });

        let mut accepted = listener.accept().unwrap();
        let frame = accepted.recv().unwrap();
        assert_eq!(frame, b"1 2 3 4");
        accepted.send(b"5 6 7 8").unwrap();

        client.join().unwrap();
    }

    #[test]
    fn test_recv_empty_on_orderly_close() {
        let listener = TcpListener::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = thread::spawn(move || {
            let socket = TcpSocket::connect("127.0.0.1", port).unwrap();
            drop(socket);
        });

        let mut accepted = listener.accept().unwrap();
        let frame = accepted.recv().unwrap();
        assert!(frame.is_empty());

        client.join().unwrap();
    }
}
