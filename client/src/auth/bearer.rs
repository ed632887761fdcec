use std::sync::Arc;

use futures::future::BoxFuture;
use hyper::{Method, Uri};
use tracing::debug;

use super::{AuthClientSlice, Authenticator, Authorization, TokenFormat, WwwAuthenticate};
use crate::{
    content::Content,
    error::{ClientError, Result},
    headers::Headers,
    line::RequestLine,
    slice::{Slice, receive},
    slices::ClientSlices,
    uri::UriClientSlice,
};

/// Obtains a token from the realm named by a `Bearer` challenge.
///
/// The token endpoint is queried with `GET {realm}?{params}`, where params
/// are the challenge parameters other than `realm`, in their original
/// order. The request itself goes through `auth`, so endpoints that want
/// e.g. Basic credentials can be served.
pub struct BearerAuthenticator<A> {
    client: Arc<dyn ClientSlices>,
    format: Arc<dyn TokenFormat>,
    auth: Arc<A>,
}

impl<A: Authenticator + 'static> BearerAuthenticator<A> {
    pub fn new(client: Arc<dyn ClientSlices>, format: impl TokenFormat + 'static, auth: A) -> Self {
        Self {
            client,
            format: Arc::new(format),
            auth: Arc::new(auth),
        }
    }

    fn request_token(&self, challenge: WwwAuthenticate) -> BoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let format = self.format.clone();
        let auth = self.auth.clone();
        Box::pin(async move {
            let realm = challenge.realm()?;
            let malformed = |reason: String| ClientError::MalformedRealm {
                realm: realm.to_string(),
                reason,
            };
            let uri = realm
                .parse::<Uri>()
                .map_err(|err| malformed(err.to_string()))?;
            let origin =
                UriClientSlice::new(client, &uri).map_err(|err| malformed(err.to_string()))?;
            let query = challenge
                .params()
                .iter()
                .filter(|param| param.name() != "realm")
                .map(|param| format!("{}={}", param.name(), param.value()))
                .collect::<Vec<_>>()
                .join("&");
            debug!("requesting token from {realm}");

            let slice = AuthClientSlice::shared(Arc::new(origin), auth);
            let parts = receive(slice.response(
                RequestLine::new(Method::GET, format!("?{query}")),
                Headers::new(),
                Content::empty(),
            ))
            .await?;
            if !parts.status.is_success() {
                parts.body.drain().await?;
                return Err(ClientError::TokenRequestFailed(parts.status));
            }
            let body = parts.body.bytes().await?;
            format.token(&body)
        })
    }
}

impl<A: Authenticator + 'static> Authenticator for BearerAuthenticator<A> {
    fn authenticate(&self, headers: &Headers) -> BoxFuture<'static, Result<Headers>> {
        let challenge = match WwwAuthenticate::from_headers(headers) {
            Ok(challenge) => challenge,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let token = self.request_token(challenge);
        Box::pin(async move { Ok(Headers::from(Authorization::Bearer(token.await?))) })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use hyper::StatusCode;

    use super::*;
    use crate::{
        auth::{Anonymous, BasicAuthenticator, OAuthTokenFormat},
        slice::RsFull,
        uri::fake::FakeClientSlices,
    };

    fn token_endpoint(
        status: StatusCode,
        body: &'static str,
    ) -> (Arc<FakeClientSlices>, Arc<Mutex<Vec<(RequestLine, Headers)>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let store = requests.clone();
        let fake = Arc::new(FakeClientSlices::new(
            move |line: RequestLine, headers: Headers, _: Content| {
                store.lock().unwrap().push((line, headers));
                RsFull::new(status).with_body(body).boxed()
            },
        ));
        (fake, requests)
    }

    fn challenge(value: &str) -> Headers {
        Headers::from([("WWW-Authenticate", value)])
    }

    #[test]
    fn test_fetches_token_from_realm() {
        smol::block_on(async {
            let (fake, requests) = token_endpoint(StatusCode::OK, r#"{"access_token":"mF_9.B5f-4.1JqM"}"#);
            let auth = BearerAuthenticator::new(fake.clone(), OAuthTokenFormat, Anonymous);

            let headers = auth
                .authenticate(&challenge(
                    r#"Bearer realm="https://artipie.com:321/get_token",param1="1",param2="abc""#,
                ))
                .await
                .unwrap();

            assert_eq!(
                headers,
                Headers::from([("Authorization", "Bearer mF_9.B5f-4.1JqM")])
            );
            assert_eq!(fake.captured(), Some((true, "artipie.com".to_string(), Some(321))));
            let requests = requests.lock().unwrap();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].0.method(), &Method::GET);
            assert_eq!(requests[0].0.path(), "/get_token");
            assert_eq!(requests[0].0.query(), Some("param1=1&param2=abc"));
        });
    }

    #[test]
    fn test_token_request_carries_nested_credentials() {
        smol::block_on(async {
            let (fake, requests) = token_endpoint(StatusCode::OK, r#"{"access_token":"abc"}"#);
            let auth = BearerAuthenticator::new(
                fake,
                OAuthTokenFormat,
                BasicAuthenticator::new("user", "pass"),
            );

            auth.authenticate(&challenge(r#"Bearer realm="http://localhost/token""#))
                .await
                .unwrap();

            let requests = requests.lock().unwrap();
            assert_eq!(requests[0].0.target(), "/token?");
            assert_eq!(
                requests[0].1.get("Authorization"),
                Some("Basic dXNlcjpwYXNz")
            );
        });
    }

    #[test]
    fn test_failed_token_request_is_an_error() {
        smol::block_on(async {
            let (fake, _) = token_endpoint(StatusCode::FORBIDDEN, "denied");
            let auth = BearerAuthenticator::new(fake, OAuthTokenFormat, Anonymous);

            let result = auth
                .authenticate(&challenge(r#"Bearer realm="http://localhost/token""#))
                .await;

            assert!(matches!(
                result,
                Err(ClientError::TokenRequestFailed(StatusCode::FORBIDDEN))
            ));
        });
    }

    #[test]
    fn test_challenge_problems_fail_before_io() {
        smol::block_on(async {
            let (fake, requests) = token_endpoint(StatusCode::OK, "{}");
            let auth = BearerAuthenticator::new(fake, OAuthTokenFormat, Anonymous);

            assert!(matches!(
                auth.authenticate(&Headers::new()).await,
                Err(ClientError::MissingChallenge)
            ));
            assert!(matches!(
                auth.authenticate(&challenge(r#"Bearer scope="x""#)).await,
                Err(ClientError::MissingRealm)
            ));
            for realm in ["ftp://files/token", "/token", "http:///token"] {
                let err = auth
                    .authenticate(&challenge(&format!(r#"Bearer realm="{realm}""#)))
                    .await
                    .unwrap_err();
                assert!(matches!(err, ClientError::MalformedRealm { .. }), "{err}");
                assert_eq!(err.kind(), crate::error::ErrorKind::Protocol);
            }
            assert!(requests.lock().unwrap().is_empty());
        });
    }
}
