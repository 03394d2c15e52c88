//! Server side of the SOCKS5 connection setup handshake
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - Method negotiation with a pluggable strategy: no authentication or
//!       username/password
//!     - CONNECT requests for IPv4, IPv6 and domain name targets
//!     - Well-formed rejection replies for BIND, UDP ASSOCIATE and unknown
//!       address types
//!     - Address codec usable on buffers and on async streams
//!     - A small CONNECT proxy server built on top of the handshake
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//! - [Username/Password Authentication (RFC 1929)](https://datatracker.ietf.org/doc/html/rfc1929)
//!
//! # Example
//! ```no_run
//! use socks5_handshake::{ReplyCode, accept};
//! use tokio::net::{TcpListener, TcpStream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = TcpListener::bind("127.0.0.1:1080").await?;
//!     let (stream, _) = listener.accept().await?;
//!
//!     let mut socks = accept(stream, None).await?;
//!     let outbound = TcpStream::connect(socks.target().to_string()).await?;
//!     let bound = outbound.local_addr()?;
//!     socks
//!         .reply(bound.ip(), bound.port(), ReplyCode::Succeeded.into())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod auth;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod server;
pub mod transport;

#[cfg(test)]
mod test_utils;

// Re-export main types at crate root for convenience
pub use address::{Address, Host};
pub use auth::{Auth, UserPass};
pub use error::{Error, Result, Stage};
pub use handshake::{Handshake, Socks, accept};
pub use protocol::{AddressType, AuthMethod, Command, ReplyCode, Version};
pub use server::Socks5Server;
pub use transport::Transport;
