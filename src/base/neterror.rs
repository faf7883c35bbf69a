use std::io;
use thiserror::Error;

/// Transport-level failures observed while probing a host.
///
/// Codes follow Chromium's `net_error_list.h` so they can be logged and
/// compared with browser-side traces.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Name resolution failed")]
    NameResolutionFailed,
    #[error("Network access denied")]
    NetworkAccessDenied,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::SslProtocolError => -107,
            NetError::AddressUnreachable => -109,
            NetError::SocketNotConnected => -112,
            NetError::ConnectionTimedOut => -118,
            NetError::NameResolutionFailed => -137,
            NetError::NetworkAccessDenied => -138,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::UnknownUrlScheme => -302,
            NetError::EmptyResponse => -324,
            NetError::InvalidHttpResponse => -370,
            NetError::Unknown(code) => *code,
        }
    }

    /// Whether a fresh attempt against the same URL could succeed.
    ///
    /// Request construction errors (bad URL, unsupported scheme) fail the
    /// same way every time.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            NetError::InvalidUrl | NetError::DisallowedUrlScheme | NetError::UnknownUrlScheme
        )
    }

    /// Map an IO error from the socket layer onto a network error code.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
            io::ErrorKind::PermissionDenied => NetError::NetworkAccessDenied,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            _ => NetError::ConnectionFailed,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -109 => NetError::AddressUnreachable,
            -112 => NetError::SocketNotConnected,
            -118 => NetError::ConnectionTimedOut,
            -137 => NetError::NameResolutionFailed,
            -138 => NetError::NetworkAccessDenied,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -302 => NetError::UnknownUrlScheme,
            -324 => NetError::EmptyResponse,
            -370 => NetError::InvalidHttpResponse,
            _ => NetError::Unknown(code),
        }
    }
}
