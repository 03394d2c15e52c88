use crate::error::{Error, Result, Stage};
use crate::protocol::{AuthMethod, AuthStatus, USERPASS_VERSION, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// UserPass holds username/password credentials as dictated
/// server-side
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

/// Auth is the authentication strategy bound to a handshake. One value is
/// configured per server and shared read-only by every connection.
///
/// Each strategy writes its own method selection reply, so it owns the
/// whole sub-negotiation once the engine has checked the client offered
/// its method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Auth {
    #[default]
    NoAuth,
    UserPass(UserPass),
}

impl Auth {
    /// code returns the METHOD byte this strategy negotiates
    pub fn code(&self) -> u8 {
        match self {
            Auth::NoAuth => AuthMethod::NoAuth as u8,
            Auth::UserPass(_) => AuthMethod::UserPass as u8,
        }
    }

    /// authenticate runs the strategy's sub-negotiation and reports whether
    /// the client was accepted
    pub async fn authenticate<S>(&self, stream: &mut S) -> Result<bool>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // ServerChoice method selection reply format
        // +----+--------+
        // |VER | METHOD |
        // +----+--------+
        // | 1  |   1    |
        // +----+--------+

        // Write selected method to client
        stream
            .write_all(&[Version::SOCKS5 as u8, self.code()])
            .await
            .map_err(Error::transport(Stage::MethodSelection))?;

        match self {
            // Nothing further to negotiate
            Auth::NoAuth => Ok(true),
            Auth::UserPass(creds) => authenticate_userpass(stream, creds).await,
        }
    }
}

/// authenticate_userpass handles username/password authentication according to RFC 1929
async fn authenticate_userpass<S>(stream: &mut S, server_creds: &UserPass) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Client Username/Password Request
    // +----+------+----------+------+----------+
    // |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    // +----+------+----------+------+----------+
    // | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    // +----+------+----------+------+----------+

    // Read sub-negotiation version and username length
    let mut header = [0u8; 2];
    read_field(stream, &mut header).await?;
    let (ver, username_len) = (header[0], header[1]);

    // Read username
    let mut username = vec![0u8; username_len as usize];
    read_field(stream, &mut username).await?;

    // Read password length
    let mut password_len = [0u8; 1];
    read_field(stream, &mut password_len).await?;

    // Read password
    let mut password = vec![0u8; password_len[0] as usize];
    read_field(stream, &mut password).await?;

    // Validate credentials. Raw bytes are compared so a non-UTF-8
    // credential is a mismatch, not an error
    let status = if ver == USERPASS_VERSION
        && username == server_creds.username.as_bytes()
        && password == server_creds.password.as_bytes()
    {
        AuthStatus::Success
    } else {
        AuthStatus::Failure
    };

    // DEBUG
    debug!(version = ver, ?status, "username/password sub-negotiation");

    // Username/Password Server response
    // +----+--------+
    // |VER | STATUS |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+

    // Write response to client
    stream
        .write_all(&[USERPASS_VERSION, status as u8])
        .await
        .map_err(Error::transport(Stage::AuthResponse))?;

    // Validate authentication status
    Ok(status == AuthStatus::Success)
}

async fn read_field<S>(stream: &mut S, buf: &mut [u8]) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    stream
        .read_exact(buf)
        .await
        .map_err(Error::transport(Stage::AuthRequest))?;
    Ok(())
}
