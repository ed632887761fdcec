//! URI based routing on top of [`ClientSlices`].

use std::sync::Arc;

use hyper::Uri;

use crate::{
    content::Content,
    error::{ClientError, Result},
    headers::Headers,
    line::RequestLine,
    slice::{Response, Slice},
    slices::ClientSlices,
};

/// Forwards requests to the origin slice with the path prefixed by a fixed
/// string. Method, query, headers and body are passed through untouched.
pub struct PathPrefixSlice<S> {
    origin: S,
    prefix: String,
}

impl<S: Slice> PathPrefixSlice<S> {
    pub fn new(origin: S, prefix: impl Into<String>) -> Self {
        Self {
            origin,
            prefix: prefix.into(),
        }
    }
}

impl<S: Slice> Slice for PathPrefixSlice<S> {
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response> {
        self.origin
            .response(line.prefixed(&self.prefix), headers, body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Http,
    Https,
}

/// Sends requests to the scheme, host and port of a base URI. A non-root
/// path of the base URI becomes a path prefix; its query and fragment are
/// ignored.
pub struct UriClientSlice {
    client: Arc<dyn ClientSlices>,
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    prefix: Option<String>,
}

impl UriClientSlice {
    /// Fails for schemes other than `http` and `https` and for URIs without
    /// a host; nothing is sent in either case.
    pub fn new(client: Arc<dyn ClientSlices>, uri: &Uri) -> Result<Self> {
        let scheme = match uri.scheme_str() {
            Some("https") => Scheme::Https,
            Some("http") => Scheme::Http,
            other => {
                return Err(ClientError::UnsupportedScheme(
                    other.unwrap_or_default().to_string(),
                ));
            }
        };
        let host = uri
            .host()
            .ok_or_else(|| ClientError::MissingHost(uri.to_string()))?
            .to_string();
        // `Uri` reports an absent path as "/", which would double the slash
        // of every forwarded path.
        let prefix = match uri.path() {
            "" | "/" => None,
            path => Some(path.to_string()),
        };
        Ok(Self {
            client,
            scheme,
            host,
            port: uri.port_u16(),
            prefix,
        })
    }

    pub fn parse(client: Arc<dyn ClientSlices>, uri: &str) -> Result<Self> {
        let parsed = uri.parse::<Uri>().map_err(|err| ClientError::InvalidUri {
            uri: uri.to_string(),
            reason: err.to_string(),
        })?;
        Self::new(client, &parsed)
    }

    fn base(&self) -> Arc<dyn Slice> {
        match self.scheme {
            Scheme::Https => self.client.https(&self.host, self.port),
            Scheme::Http => self.client.http(&self.host, self.port),
        }
    }
}

impl Slice for UriClientSlice {
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response> {
        match &self.prefix {
            Some(prefix) => PathPrefixSlice::new(self.base(), prefix.as_str())
                .response(line, headers, body),
            None => self.base().response(line, headers, body),
        }
    }
}
