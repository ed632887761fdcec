use std::{fmt, str::FromStr};

use hyper::{Method, Version};

use crate::error::{ClientError, Result};

/// `<method> <target> <version>` of an HTTP request.
///
/// The target is kept verbatim: no percent-decoding or normalisation, so a
/// target such as `/%26/file.txt?p=%20%20` survives a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    target: String,
    version: Version,
}

impl RequestLine {
    /// Builds a line without checking `method`; extension methods are only
    /// rejected once the line reaches the transport. See
    /// [`RequestLine::is_standard`].
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self::with_version(method, target, Version::HTTP_11)
    }

    pub fn with_version(method: Method, target: impl Into<String>, version: Version) -> Self {
        Self {
            method,
            target: target.into(),
            version,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Raw path of the target, empty for query-only targets like `?a=b`.
    pub fn path(&self) -> &str {
        let end = self.target.find(['?', '#']).unwrap_or(self.target.len());
        &self.target[..end]
    }

    /// Raw query without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        let without_fragment = match self.target.find('#') {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        };
        without_fragment
            .find('?')
            .map(|pos| &without_fragment[pos + 1..])
    }

    pub fn fragment(&self) -> Option<&str> {
        self.target.find('#').map(|pos| &self.target[pos + 1..])
    }

    /// Whether the method is one of the standard HTTP/1.1 verbs (RFC 9110
    /// plus `PATCH`).
    pub fn is_standard(&self) -> bool {
        is_standard(&self.method)
    }

    /// Same line with `prefix` glued in front of the path. Query and fragment
    /// are carried over untouched and no slash is added or removed.
    pub fn prefixed(&self, prefix: &str) -> Self {
        let path = self.path();
        let rest = &self.target[path.len()..];
        Self {
            method: self.method.clone(),
            target: format!("{prefix}{path}{rest}"),
            version: self.version,
        }
    }
}

fn parse_method(token: &str) -> Result<Method> {
    let method = Method::from_bytes(token.as_bytes())
        .map_err(|_| ClientError::InvalidRequestLine(format!("bad method '{token}'")))?;
    if !is_standard(&method) {
        return Err(ClientError::InvalidRequestLine(format!(
            "unsupported method '{method}'"
        )));
    }
    Ok(method)
}

fn is_standard(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::HEAD
            | Method::POST
            | Method::PUT
            | Method::DELETE
            | Method::CONNECT
            | Method::OPTIONS
            | Method::TRACE
            | Method::PATCH
    )
}

fn parse_version(token: &str) -> Result<Version> {
    match token {
        "HTTP/0.9" => Ok(Version::HTTP_09),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Ok(Version::HTTP_2),
        "HTTP/3" | "HTTP/3.0" => Ok(Version::HTTP_3),
        other => Err(ClientError::InvalidRequestLine(format!(
            "unknown version '{other}'"
        ))),
    }
}

impl FromStr for RequestLine {
    type Err = ClientError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.split(' ');
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ClientError::InvalidRequestLine(line.to_string()));
        };
        if target.is_empty() {
            return Err(ClientError::InvalidRequestLine(line.to_string()));
        }
        Ok(Self {
            method: parse_method(method)?,
            target: target.to_string(),
            version: parse_version(version)?,
        })
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.method, self.target, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let line: RequestLine = "GET /api/users?id=1 HTTP/1.1".parse().unwrap();

        assert_eq!(line.method(), &Method::GET);
        assert_eq!(line.target(), "/api/users?id=1");
        assert_eq!(line.version(), Version::HTTP_11);
        assert_eq!(line.to_string(), "GET /api/users?id=1 HTTP/1.1");
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!("GET /path".parse::<RequestLine>().is_err());
        assert!("GET /path HTTP/1.1 extra".parse::<RequestLine>().is_err());
        assert!("BREW /pot HTTP/1.1".parse::<RequestLine>().is_err());
        assert!("GET /path HTTP/7".parse::<RequestLine>().is_err());
    }

    #[test]
    fn test_extension_methods_are_not_standard() {
        assert!(RequestLine::new(Method::PATCH, "/").is_standard());

        let brew = Method::from_bytes(b"BREW").unwrap();
        assert!(!RequestLine::new(brew, "/pot").is_standard());
    }

    #[test]
    fn test_target_components_are_raw() {
        let line = RequestLine::new(Method::GET, "/%26/file.txt?p=%20%20#top");

        assert_eq!(line.path(), "/%26/file.txt");
        assert_eq!(line.query(), Some("p=%20%20"));
        assert_eq!(line.fragment(), Some("top"));
    }

    #[test]
    fn test_query_only_target() {
        let line = RequestLine::new(Method::GET, "?service=registry&scope=pull");

        assert_eq!(line.path(), "");
        assert_eq!(line.query(), Some("service=registry&scope=pull"));
        assert_eq!(line.fragment(), None);
    }

    #[test]
    fn test_prefix_is_literal_concatenation() {
        let line = RequestLine::new(Method::PUT, "/path");
        assert_eq!(line.prefixed("/prefix").target(), "/prefix/path");
        assert_eq!(line.prefixed("/prefix").method(), &Method::PUT);

        let line = RequestLine::new(Method::GET, "/%26/file.txt?p=%20%20");
        let prefixed = line.prefixed("/aaa/bbb");
        assert_eq!(prefixed.path(), "/aaa/bbb/%26/file.txt");
        assert_eq!(prefixed.query(), Some("p=%20%20"));

        let line = RequestLine::new(Method::GET, "/x");
        assert_eq!(line.prefixed("/base/").target(), "/base//x");

        let line = RequestLine::new(Method::GET, "?a=b");
        assert_eq!(line.prefixed("/get_token").target(), "/get_token?a=b");
    }
}
