use std::{fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::STANDARD};
use pest::{Parser, iterators::Pair};
use pest_derive::Parser;

use crate::{
    error::{ClientError, Result},
    headers::{Header, Headers},
};

#[derive(Parser)]
#[grammar = "./auth/challenge.pest"]
struct ChallengeParser;

/// Credential carried by an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Authorization {
    pub const NAME: &'static str = "Authorization";

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Header value, e.g. `Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==`.
    pub fn value(&self) -> String {
        match self {
            Self::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
            Self::Bearer(token) => format!("Bearer {token}"),
        }
    }

    pub fn header(&self) -> Header {
        Header::new(Self::NAME, self.value())
    }
}

impl From<Authorization> for Headers {
    fn from(auth: Authorization) -> Self {
        Headers::from(auth.header())
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    name: String,
    value: String,
}

impl Param {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Parsed `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WwwAuthenticate {
    scheme: String,
    params: Vec<Param>,
    token68: Option<String>,
}

impl WwwAuthenticate {
    pub const NAME: &'static str = "WWW-Authenticate";

    /// Challenge carried by the first `WWW-Authenticate` entry of `headers`.
    pub fn from_headers(headers: &Headers) -> Result<Self> {
        headers
            .get(Self::NAME)
            .ok_or(ClientError::MissingChallenge)?
            .parse()
    }

    /// Authentication scheme exactly as sent, e.g. `Bearer`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Parameters in the order they were sent, `realm` included.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|param| param.name.eq_ignore_ascii_case(name))
            .map(Param::value)
    }

    pub fn realm(&self) -> Result<&str> {
        self.param("realm").ok_or(ClientError::MissingRealm)
    }

    pub fn token68(&self) -> Option<&str> {
        self.token68.as_deref()
    }
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn build_param(pair: Pair<'_, Rule>) -> Option<Param> {
    let mut inner = pair.into_inner();
    let name = inner.next()?.as_str().to_string();
    let value = inner.next()?;
    let value = match value.as_rule() {
        Rule::quoted => unescape(value.into_inner().next()?.as_str()),
        _ => value.as_str().to_string(),
    };
    Some(Param { name, value })
}

impl FromStr for WwwAuthenticate {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self> {
        let malformed = || ClientError::MalformedChallenge(value.to_string());
        let challenge = ChallengeParser::parse(Rule::challenge, value)
            .map_err(|_| malformed())?
            .next()
            .ok_or_else(malformed)?;

        let mut scheme = None;
        let mut params = Vec::new();
        let mut token68 = None;
        for pair in challenge.into_inner() {
            match pair.as_rule() {
                Rule::scheme => scheme = Some(pair.as_str().to_string()),
                Rule::params => {
                    for param in pair.into_inner() {
                        params.push(build_param(param).ok_or_else(malformed)?);
                    }
                }
                Rule::token68 => token68 = Some(pair.as_str().to_string()),
                _ => continue,
            }
        }

        Ok(Self {
            scheme: scheme.ok_or_else(malformed)?,
            params,
            token68,
        })
    }
}
