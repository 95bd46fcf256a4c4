//! Raw transport contract consumed by the adapter

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connection-oriented transport the adapter wraps.
///
/// `read` returning `Ok(0)` means end of input. Both `read` and `write`
/// may transfer fewer bytes than requested.
#[async_trait]
pub trait Transport: Send {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    async fn close(&mut self) -> io::Result<()>;

    fn is_closed(&self) -> bool;

    /// Remote address, for diagnostics only.
    fn remote_addr(&self) -> Option<SocketAddr>;
}

/// Transport over any tokio `AsyncRead + AsyncWrite` value: TCP sockets,
/// in-memory duplex pipes, TLS streams.
pub struct IoTransport<T> {
    io: T,
    remote_addr: Option<SocketAddr>,
    closed: bool,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoTransport<T> {
    pub fn new(io: T) -> Self {
        Self {
            io,
            remote_addr: None,
            closed: false,
        }
    }

    pub fn with_remote_addr(io: T, remote_addr: SocketAddr) -> Self {
        Self {
            io,
            remote_addr: Some(remote_addr),
            closed: false,
        }
    }
}

impl IoTransport<TcpStream> {
    /// Wrap a TCP socket, capturing the peer address for diagnostics.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let remote_addr = stream.peer_addr().ok();
        Self {
            io: stream,
            remote_addr,
            closed: false,
        }
    }
}

#[async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for IoTransport<T> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.io.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io.write(buf).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.io.shutdown().await
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}
