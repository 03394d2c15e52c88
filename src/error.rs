//! Error types for the SOCKS5 handshake

use std::{fmt, io};
use thiserror::Error;

/// Stage names the field being read or written when a transport error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    VersionGreeting,
    MethodList,
    RequestHeader,
    AddressType,
    DomainLength,
    AddressBody,
    LocalAddress,
    MethodSelection,
    AuthRequest,
    AuthResponse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::VersionGreeting => "version greeting",
            Stage::MethodList => "method list",
            Stage::RequestHeader => "request header",
            Stage::AddressType => "address type",
            Stage::DomainLength => "domain length",
            Stage::AddressBody => "address body",
            Stage::LocalAddress => "local address",
            Stage::MethodSelection => "method selection",
            Stage::AuthRequest => "auth request",
            Stage::AuthResponse => "auth response",
        };
        f.write_str(name)
    }
}

/// Error is the single error type returned by the address codec and the handshake
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer too short or otherwise not an address
    #[error("malformed address: {0}")]
    MalformedAddress(&'static str),

    /// Declared payload longer than the bytes available
    #[error("truncated address: need {needed} bytes, got {available}")]
    TruncatedAddress { needed: usize, available: usize },

    #[error("address type {0:#04x} not supported")]
    UnsupportedAddressType(u8),

    #[error("socks version {0} not supported")]
    UnsupportedVersion(u8),

    /// The bound method was not offered by the client
    #[error("auth method {method:#04x} not offered by client (offered {offered:?})")]
    AuthMethodMismatch { method: u8, offered: Vec<u8> },

    #[error("authentication failed for method {method:#04x}")]
    AuthenticationFailed {
        method: u8,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("command {0:#04x} not supported")]
    CommandNotSupported(u8),

    #[error("reply code {0:#04x} not supported")]
    InvalidReplyCode(u8),

    #[error("failed to write reply: {0}")]
    ReplyWriteFailed(#[source] io::Error),

    /// I/O failure while reading or writing a protocol field
    #[error("transport error during {stage}: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// transport wraps an I/O error with the stage it happened in
    pub fn transport(stage: Stage) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Transport { stage, source }
    }
}

/// Result type alias for Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_error_names_stage() {
        let err = Error::transport(Stage::DomainLength)(io::ErrorKind::UnexpectedEof.into());
        assert!(err.to_string().contains("domain length"));
        assert!(err.source().is_some());
    }

    #[test]
    fn auth_failure_keeps_cause() {
        let cause = Error::transport(Stage::AuthRequest)(io::ErrorKind::BrokenPipe.into());
        let err = Error::AuthenticationFailed {
            method: 0x02,
            source: Some(Box::new(cause)),
        };
        assert!(err.source().unwrap().to_string().contains("auth request"));
    }
}
