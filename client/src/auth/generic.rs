use std::sync::Arc;

use futures::future::BoxFuture;

use super::{
    Anonymous, Authenticator, BasicAuthenticator, BearerAuthenticator, OAuthTokenFormat,
    WwwAuthenticate,
};
use crate::{
    error::{ClientError, Result},
    headers::Headers,
    slices::ClientSlices,
};

/// Picks an authenticator by the scheme of the `WWW-Authenticate` challenge.
///
/// Without a challenge nothing is added. `Basic` and `Bearer` (matched
/// exactly) go to their authenticators; any other scheme is an error.
pub struct GenericAuthenticator {
    basic: Box<dyn Authenticator>,
    bearer: Box<dyn Authenticator>,
}

impl GenericAuthenticator {
    pub fn new(basic: impl Authenticator + 'static, bearer: impl Authenticator + 'static) -> Self {
        Self {
            basic: Box::new(basic),
            bearer: Box::new(bearer),
        }
    }

    /// No Basic credentials; Bearer tokens are requested anonymously.
    pub fn anonymous(client: Arc<dyn ClientSlices>) -> Self {
        Self::new(
            Anonymous,
            BearerAuthenticator::new(client, OAuthTokenFormat, Anonymous),
        )
    }

    /// Answers Basic challenges with the credentials, and uses them as Basic
    /// credentials for Bearer token requests too.
    pub fn with_credentials(
        client: Arc<dyn ClientSlices>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let basic = BasicAuthenticator::new(username, password);
        Self::new(
            basic.clone(),
            BearerAuthenticator::new(client, OAuthTokenFormat, basic),
        )
    }
}

impl Authenticator for GenericAuthenticator {
    fn authenticate(&self, headers: &Headers) -> BoxFuture<'static, Result<Headers>> {
        if !headers.contains(WwwAuthenticate::NAME) {
            return Anonymous.authenticate(headers);
        }
        let challenge = match WwwAuthenticate::from_headers(headers) {
            Ok(challenge) => challenge,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        match challenge.scheme() {
            "Basic" => self.basic.authenticate(headers),
            "Bearer" => self.bearer.authenticate(headers),
            other => {
                let err = ClientError::UnsupportedAuthScheme(other.to_string());
                Box::pin(async move { Err(err) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hyper::StatusCode;

    use super::*;
    use crate::{content::Content, line::RequestLine, slice::RsFull, uri::fake::FakeClientSlices};

    fn token_client() -> Arc<FakeClientSlices> {
        Arc::new(FakeClientSlices::new(
            |_: RequestLine, headers: Headers, _: Content| {
                let token = if headers.contains("Authorization") {
                    r#"{"access_token":"with-basic"}"#
                } else {
                    r#"{"access_token":"anonymous"}"#
                };
                RsFull::new(StatusCode::OK).with_body(token).boxed()
            },
        ))
    }

    fn challenge(value: &str) -> Headers {
        Headers::from([("WWW-Authenticate", value)])
    }

    #[test]
    fn test_no_challenge_adds_nothing() {
        smol::block_on(async {
            let auth = GenericAuthenticator::with_credentials(token_client(), "alice", "secret");

            assert!(auth.authenticate(&Headers::new()).await.unwrap().is_empty());
            assert!(
                auth.authenticate(&Headers::from([("Content-Type", "text/plain")]))
                    .await
                    .unwrap()
                    .is_empty()
            );
        });
    }

    #[test]
    fn test_basic_challenge() {
        smol::block_on(async {
            let with_credentials =
                GenericAuthenticator::with_credentials(token_client(), "alice", "secret");
            let anonymous = GenericAuthenticator::anonymous(token_client());

            assert_eq!(
                with_credentials
                    .authenticate(&challenge(r#"Basic realm="repo""#))
                    .await
                    .unwrap(),
                Headers::from([("Authorization", "Basic YWxpY2U6c2VjcmV0")])
            );
            assert!(
                anonymous
                    .authenticate(&challenge(r#"Basic realm="repo""#))
                    .await
                    .unwrap()
                    .is_empty()
            );
        });
    }

    #[test]
    fn test_bearer_challenge() {
        smol::block_on(async {
            let value = r#"Bearer realm="https://auth.example.com/token",service="registry""#;

            let token = GenericAuthenticator::anonymous(token_client())
                .authenticate(&challenge(value))
                .await
                .unwrap();
            assert_eq!(token.get("Authorization"), Some("Bearer anonymous"));

            let token = GenericAuthenticator::with_credentials(token_client(), "alice", "secret")
                .authenticate(&challenge(value))
                .await
                .unwrap();
            assert_eq!(token.get("Authorization"), Some("Bearer with-basic"));
        });
    }

    #[test]
    fn test_unknown_scheme_is_an_error() {
        smol::block_on(async {
            let auth = GenericAuthenticator::anonymous(token_client());

            for value in [r#"Digest realm="x", nonce="y""#, r#"bearer realm="http://h/t""#] {
                let result = auth.authenticate(&challenge(value)).await;
                assert!(
                    matches!(result, Err(ClientError::UnsupportedAuthScheme(_))),
                    "{value}"
                );
            }
        });
    }
}
