//! Server side of the SOCKS5 connection setup.
//!
//! [`Handshake`] runs greeting, method negotiation, authentication and
//! request parsing, strictly in that order. On success it yields a
//! [`Socks`] holding the client's target address; the caller dials the
//! target and reports the outcome with [`Socks::reply`].

use crate::address::Address;
use crate::auth::Auth;
use crate::error::{Error, Result, Stage};
use crate::protocol::{AuthMethod, Command, RSV, ReplyCode, Version};
use crate::transport::Transport;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Handshake is a connection that has not finished SOCKS5 negotiation yet
pub struct Handshake<S> {
    stream: S,
    auth: Arc<Auth>,
}

impl<S: Transport> Handshake<S> {
    /// new binds a connection to an authentication strategy. `None` selects
    /// no authentication.
    pub fn new(stream: S, auth: Option<Arc<Auth>>) -> Self {
        Self {
            stream,
            auth: auth.unwrap_or_default(),
        }
    }

    /// run drives the handshake up to the point where the target address
    /// is known. Any error is final and the connection should be dropped.
    pub async fn run(mut self) -> Result<Socks<S>> {
        self.negotiate_auth().await?;
        let target = self.read_request().await?;

        debug!(%target, "handshake complete");

        Ok(Socks {
            stream: self.stream,
            target,
        })
    }

    async fn negotiate_auth(&mut self) -> Result<()> {
        // ClientHello format
        // +----+----------+----------+
        // |VER | NMETHODS | METHODS  |
        // +----+----------+----------+
        // | 1  |    1     | 1 to 255 |
        // +----+----------+----------+
        let mut buf = [0u8; 2];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(Error::transport(Stage::VersionGreeting))?;

        let (version, n_methods) = (buf[0], buf[1]);

        if version != Version::SOCKS5 as u8 {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut methods = vec![0u8; n_methods as usize];
        self.stream
            .read_exact(&mut methods)
            .await
            .map_err(Error::transport(Stage::MethodList))?;

        let method = self.auth.code();
        debug!(?methods, method, "client greeting");

        if !methods.contains(&method) {
            warn!(?methods, method, "no acceptable auth method");
            self.stream
                .write_all(&[Version::SOCKS5 as u8, AuthMethod::NoAcceptable as u8])
                .await
                .map_err(Error::ReplyWriteFailed)?;
            return Err(Error::AuthMethodMismatch {
                method,
                offered: methods,
            });
        }

        // The strategy writes its own method selection
        match self.auth.authenticate(&mut self.stream).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::AuthenticationFailed {
                method,
                source: None,
            }),
            Err(e) => Err(Error::AuthenticationFailed {
                method,
                source: Some(Box::new(e)),
            }),
        }
    }

    async fn read_request(&mut self) -> Result<Address> {
        // SOCKS5 request format
        // +----+-----+-------+------+----------+----------+
        // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
        // +----+-----+-------+------+----------+----------+
        // | 1  |  1  | X'00' |  1   | Variable |    2     |
        // +----+-----+-------+------+----------+----------+
        let mut header = [0u8; 4];
        self.stream
            .read_exact(&mut header)
            .await
            .map_err(Error::transport(Stage::RequestHeader))?;

        // RSV (header[2]) is not checked
        let (version, command, atyp) = (header[0], header[1], header[3]);

        if version != Version::SOCKS5 as u8 {
            return Err(Error::UnsupportedVersion(version));
        }

        if Command::from_byte(command) != Some(Command::Connect) {
            return Err(self
                .reject(ReplyCode::CommandNotSupported, Error::CommandNotSupported(command))
                .await);
        }

        match Address::read_with_type(&mut self.stream, atyp).await {
            Err(Error::UnsupportedAddressType(atyp)) => Err(self
                .reject(
                    ReplyCode::AddrTypeUnsupported,
                    Error::UnsupportedAddressType(atyp),
                )
                .await),
            result => result,
        }
    }

    // reject sends a failure reply carrying our local address and returns the
    // error to surface: the protocol error, or the write failure if the reply
    // never made it out
    async fn reject(&mut self, code: ReplyCode, err: Error) -> Error {
        warn!(?code, "rejecting request: {err}");

        let local = match self.stream.local_addr() {
            Ok(local) => local,
            Err(e) => return Error::transport(Stage::LocalAddress)(e),
        };

        match write_reply(&mut self.stream, code, local.ip(), local.port()).await {
            Ok(()) => err,
            Err(write_err) => write_err,
        }
    }
}

/// accept runs a full handshake on stream with the given strategy
pub async fn accept<S: Transport>(stream: S, auth: Option<Arc<Auth>>) -> Result<Socks<S>> {
    Handshake::new(stream, auth).run().await
}

/// Socks is a negotiated connection waiting for the caller to report the
/// outcome of dialing the target
#[derive(Debug)]
pub struct Socks<S> {
    stream: S,
    target: Address,
}

impl<S> Socks<S>
where
    S: AsyncWrite + Unpin,
{
    /// target is the address the client asked to connect to
    pub fn target(&self) -> &Address {
        &self.target
    }

    /// get_ref borrows the client connection
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// get_mut borrows the client connection mutably, e.g. to set socket
    /// options before replying
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// into_inner hands the connection back for relaying
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// reply tells the client the result of its request. `code` must be a
    /// defined reply code; ip and port are the bound address to report.
    /// Nothing stops a second call from sending a second reply.
    pub async fn reply(&mut self, ip: IpAddr, port: u16, code: u8) -> Result<()> {
        let code = ReplyCode::try_from(code)?;
        write_reply(&mut self.stream, code, ip, port).await
    }
}

/// encode_reply builds a server reply. IPv4-mapped IPv6 addresses are sent
/// in their 4-byte form.
pub fn encode_reply(code: ReplyCode, ip: IpAddr, port: u16) -> Vec<u8> {
    // SOCKS5 reply format
    // +----+-----+-------+------+----------+----------+
    // |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+
    let bound = Address::ip(ip.to_canonical(), port);
    let mut reply = Vec::with_capacity(3 + bound.encoded_len());
    reply.extend_from_slice(&[Version::SOCKS5 as u8, code as u8, RSV]);
    bound.encode_into(&mut reply);
    reply
}

async fn write_reply<S>(stream: &mut S, code: ReplyCode, ip: IpAddr, port: u16) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let reply = encode_reply(code, ip, port);
    stream
        .write_all(&reply)
        .await
        .map_err(Error::ReplyWriteFailed)?;
    stream.flush().await.map_err(Error::ReplyWriteFailed)
}
