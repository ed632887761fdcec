use hyper::StatusCode;
use thiserror::Error;

/// Coarse classification of [`ClientError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any I/O was attempted.
    Configuration,
    /// The peer answered, but not in a way this layer can use.
    Protocol,
    /// Network, TLS or timeout failure reported by the transport.
    Transport,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Scheme '{0}' is not supported")]
    UnsupportedScheme(String),

    #[error("URI '{0}' has no host")]
    MissingHost(String),

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Unsupported authentication scheme: {0}")]
    UnsupportedAuthScheme(String),

    #[error("TLS configuration failed: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("Invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("Malformed WWW-Authenticate challenge '{0}'")]
    MalformedChallenge(String),

    #[error("Response does not carry a WWW-Authenticate challenge")]
    MissingChallenge,

    #[error("Challenge has no realm")]
    MissingRealm,

    #[error("Malformed realm URI '{realm}': {reason}")]
    MalformedRealm { realm: String, reason: String },

    #[error("Token request failed with status {0}")]
    TokenRequestFailed(StatusCode),

    #[error("Token extraction failed: {0}")]
    TokenFormat(String),

    #[error("Response was never delivered")]
    NotDelivered,

    #[error("Response was delivered more than once")]
    DeliveredTwice,

    #[error("Invalid request for the wire: {0}")]
    InvalidRequest(#[from] hyper::http::Error),

    #[error("Invalid redirect location '{0}'")]
    InvalidLocation(String),

    #[error("Too many redirects, gave up after {0}")]
    TooManyRedirects(usize),

    #[error("Proxy refused tunnel: {0}")]
    ProxyTunnel(String),

    #[error("Connection failed: {0}")]
    Connect(std::io::Error),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(std::io::Error),

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("HTTP/1.1 handshake failed: {0}")]
    Handshake(hyper::Error),

    #[error("Request failed: {0}")]
    RequestFailed(hyper::Error),

    #[error("Response body failed: {0}")]
    Body(hyper::Error),

    #[error("Timed out while {0}")]
    Timeout(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedScheme(_)
            | Self::MissingHost(_)
            | Self::InvalidUri { .. }
            | Self::UnsupportedAuthScheme(_)
            | Self::TlsConfig(_) => ErrorKind::Configuration,
            Self::InvalidRequestLine(_)
            | Self::MalformedChallenge(_)
            | Self::MissingChallenge
            | Self::MissingRealm
            | Self::MalformedRealm { .. }
            | Self::TokenRequestFailed(_)
            | Self::TokenFormat(_)
            | Self::NotDelivered
            | Self::DeliveredTwice
            | Self::InvalidRequest(_)
            | Self::InvalidLocation(_)
            | Self::TooManyRedirects(_)
            | Self::ProxyTunnel(_) => ErrorKind::Protocol,
            Self::Connect(_)
            | Self::TlsHandshake(_)
            | Self::InvalidServerName(_)
            | Self::Handshake(_)
            | Self::RequestFailed(_)
            | Self::Body(_)
            | Self::Timeout(_)
            | Self::Io(_) => ErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
