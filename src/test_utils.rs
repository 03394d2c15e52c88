//! An in-memory transport for driving the handshake in tests.

use crate::transport::Transport;
use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// MockTransport is the server half of a `tokio::io::duplex` pipe that
/// reports a fixed local address.
#[derive(Debug)]
pub struct MockTransport {
    inner: DuplexStream,
    local: SocketAddr,
}

/// Creates a connected (server, client) pair. The server side reports
/// `local` as its bound address.
pub fn mock_pair(local: SocketAddr) -> (MockTransport, DuplexStream) {
    let (server, client) = tokio::io::duplex(1024);
    (
        MockTransport {
            inner: server,
            local,
        },
        client,
    )
}

impl Transport for MockTransport {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
