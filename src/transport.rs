use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Transport is a client connection the handshake can run over: an ordered
/// byte stream that knows which local address it is bound to. The local
/// address is sent back to the client in rejection replies.
pub trait Transport: AsyncRead + AsyncWrite + Unpin {
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Transport for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        (**self).local_addr()
    }
}
