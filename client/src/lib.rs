//! Composable HTTP client.
//!
//! Requests flow through [`Slice`]s: [`ClientSlices`] hands out slices bound
//! to one origin, [`UriClientSlice`] routes to the origin of a base URI and
//! [`AuthClientSlice`] answers `401` challenges through an
//! [`Authenticator`]. [`HyperClientSlices`] is the network-backed
//! implementation.

pub mod auth;
mod content;
mod error;
mod headers;
mod line;
mod settings;
mod slice;
mod slices;
mod transport;
mod uri;

pub use auth::{
    Anonymous, AuthClientSlice, Authenticator, Authorization, BasicAuthenticator,
    BearerAuthenticator, GenericAuthenticator, OAuthTokenFormat, TokenFormat, WwwAuthenticate,
};
pub use content::Content;
pub use error::{ClientError, ErrorKind, Result};
pub use headers::{Header, Headers};
pub use line::RequestLine;
pub use settings::{
    ClientConfig, DefaultSettings, Proxy, Settings, SettingsExt, WithConnectTimeout,
    WithFollowRedirects, WithIdleTimeout, WithProxy, WithTrustAll,
};
pub use slice::{AsyncResponse, Connection, Parts, Response, RsFull, Slice, receive};
pub use slices::{ClientSlices, HTTP_PORT, HTTPS_PORT};
pub use transport::{HyperClientSlices, MAX_REDIRECTS};
pub use uri::{PathPrefixSlice, UriClientSlice};
