use crate::{
    auth::{Auth, UserPass},
    handshake::{Handshake, Socks},
    protocol::ReplyCode,
};
use anyhow::{Result, anyhow, bail};
use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::copy_bidirectional,
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tracing::{debug, error, info};

/// Default time a client gets to finish the handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Socks5Server is a CONNECT-only SOCKS5 proxy built on the handshake
/// engine. It houses the listener and the strategy shared by all clients.
pub struct Socks5Server {
    pub listen_addr: String,
    pub auth: Arc<Auth>,
    pub handshake_timeout: Option<Duration>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            auth: Arc::new(Auth::NoAuth),
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            listener: None,
        }
    }

    /// with_auth requires username/password authentication when credentials
    /// are given, and no authentication otherwise
    pub fn with_auth(mut self, auth: Option<UserPass>) -> Self {
        self.auth = Arc::new(auth.map_or(Auth::NoAuth, Auth::UserPass));
        self
    }

    /// with_handshake_timeout bounds how long a client may take to negotiate.
    /// `None` waits forever.
    pub fn with_handshake_timeout(mut self, handshake_timeout: Option<Duration>) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// bind to the listen address. Only one bind is allowed.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("[ERR] listener already bound");
        }

        // Instantiate tokio listener
        let listener = TcpListener::bind(&self.listen_addr).await?;
        let addr = listener.local_addr()?;

        // DEBUG
        info!("SOCKS5 proxy listening on {addr}");

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run accepts clients forever, one task per connection
    pub async fn run(mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow!("[ERR] listener missing after bind"))?;

        // Listen for connections to proxy
        loop {
            // Accept incoming connection
            let (inbound, peer_addr) = listener.accept().await?;

            // Clone shared config for this connection
            let auth = Arc::clone(&self.auth);
            let handshake_timeout = self.handshake_timeout;

            // Spawn async task
            tokio::spawn(async move {
                // DEBUG
                info!("new client: {peer_addr}");

                // Send connection to connection handler
                if let Err(e) = handle_connection(inbound, auth, handshake_timeout).await {
                    error!("connection error from {peer_addr}: {e:#}");
                }
            });
        }
    }
}

/// handle_connection runs the SOCKS5 flow for one client: handshake, dial,
/// reply, relay
async fn handle_connection(
    stream: TcpStream,
    auth: Arc<Auth>,
    handshake_timeout: Option<Duration>,
) -> Result<()> {
    // Negotiate auth and read the request, bounded by the deadline if any
    let handshake = Handshake::new(stream, Some(auth)).run();

    let mut socks = match handshake_timeout {
        Some(limit) => timeout(limit, handshake)
            .await
            .map_err(|_| anyhow!("[ERR] handshake timed out after {limit:?}"))??,
        None => handshake.await?,
    };

    // Retrieve target from request
    let target = socks.target().to_string();
    debug!("dialing {target}");

    // Connect to target
    let outbound = match TcpStream::connect(&target).await {
        Ok(outbound) => outbound,
        Err(e) => {
            // Tell the client why the dial failed
            let code = reply_code_for(&e);
            socks
                .reply(Ipv4Addr::UNSPECIFIED.into(), 0, code.into())
                .await?;
            return Err(anyhow!("[ERR] failed to connect to {target}: {e}"));
        }
    };

    // Send OK reply with the outbound socket's address
    let bound = outbound.local_addr()?;
    socks
        .reply(bound.ip(), bound.port(), ReplyCode::Succeeded.into())
        .await?;

    // Proxy
    relay(socks, outbound, &target).await
}

/// reply_code_for maps a dial failure to the reply sent to the client
fn reply_code_for(e: &io::Error) -> ReplyCode {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
        io::ErrorKind::HostUnreachable => ReplyCode::HostUnreachable,
        io::ErrorKind::NetworkUnreachable => ReplyCode::NetworkUnreachable,
        io::ErrorKind::PermissionDenied => ReplyCode::ConnectionNotAllowed,
        io::ErrorKind::TimedOut => ReplyCode::TtlExpired,
        _ => ReplyCode::ServerFailure,
    }
}

/// relay bidirectionally copies data between the client and the target
async fn relay(socks: Socks<TcpStream>, mut outbound: TcpStream, target: &str) -> Result<()> {
    // Take the client connection back from the handshake
    let mut inbound = socks.into_inner();

    // Relay between streams
    let (from_client, from_server) = copy_bidirectional(&mut inbound, &mut outbound).await?;

    // DEBUG
    info!(
        "connection to {target} closed: {from_client} bytes from client, {from_server} bytes from server"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_errors_map_to_reply_codes() {
        let cases = [
            (io::ErrorKind::ConnectionRefused, ReplyCode::ConnectionRefused),
            (io::ErrorKind::HostUnreachable, ReplyCode::HostUnreachable),
            (io::ErrorKind::NetworkUnreachable, ReplyCode::NetworkUnreachable),
            (io::ErrorKind::PermissionDenied, ReplyCode::ConnectionNotAllowed),
            (io::ErrorKind::TimedOut, ReplyCode::TtlExpired),
            (io::ErrorKind::Other, ReplyCode::ServerFailure),
        ];
        for (kind, code) in cases {
            assert_eq!(reply_code_for(&io::Error::from(kind)), code);
        }
    }

    #[test]
    fn builder_selects_strategy() {
        let server = Socks5Server::new("127.0.0.1:0");
        assert_eq!(*server.auth, Auth::NoAuth);

        let creds = UserPass {
            username: "u".to_string(),
            password: "p".to_string(),
        };
        let server = Socks5Server::new("127.0.0.1:0")
            .with_auth(Some(creds.clone()))
            .with_handshake_timeout(None);
        assert_eq!(*server.auth, Auth::UserPass(creds));
        assert_eq!(server.handshake_timeout, None);
    }

    #[tokio::test]
    async fn bind_twice_fails() {
        let mut server = Socks5Server::new("127.0.0.1:0");
        let addr = server.bind().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.bind().await.is_err());
    }
}
