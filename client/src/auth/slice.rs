use std::sync::Arc;

use futures::future::BoxFuture;
use hyper::StatusCode;
use tracing::debug;

use super::Authenticator;
use crate::{
    content::Content,
    error::Result,
    headers::Headers,
    line::RequestLine,
    slice::{Connection, Response, Slice, receive},
};

/// Decorates a slice with authentication.
///
/// Each request is sent with whatever the authenticator offers up front. If
/// the origin answers `401 Unauthorized`, the authenticator sees the
/// response headers and the request is sent once more with the new
/// credentials. The second response is delivered as is.
pub struct AuthClientSlice<S, A> {
    origin: Arc<S>,
    auth: Arc<A>,
}

impl<S, A> AuthClientSlice<S, A>
where
    S: Slice + 'static,
    A: Authenticator + 'static,
{
    pub fn new(origin: S, auth: A) -> Self {
        Self::shared(Arc::new(origin), Arc::new(auth))
    }

    pub fn shared(origin: Arc<S>, auth: Arc<A>) -> Self {
        Self { origin, auth }
    }
}

impl<S, A> Slice for AuthClientSlice<S, A>
where
    S: Slice + 'static,
    A: Authenticator + 'static,
{
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response> {
        Box::new(AuthResponse {
            origin: self.origin.clone(),
            auth: self.auth.clone(),
            line,
            headers,
            body,
        })
    }
}

struct AuthResponse<S, A> {
    origin: Arc<S>,
    auth: Arc<A>,
    line: RequestLine,
    headers: Headers,
    body: Content,
}

impl<S, A> Response for AuthResponse<S, A>
where
    S: Slice + 'static,
    A: Authenticator + 'static,
{
    fn send<'a>(self: Box<Self>, connection: &'a mut dyn Connection) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Self {
                origin,
                auth,
                line,
                headers,
                body,
            } = *self;
            // Buffered once so the exact same bytes can go out twice.
            let body = body.bytes().await?;

            let preemptive = auth.authenticate(&Headers::new()).await?;
            let first = receive(origin.response(
                line.clone(),
                headers.merged(&preemptive),
                Content::from(body.clone()),
            ))
            .await?;
            if first.status != StatusCode::UNAUTHORIZED {
                return connection
                    .accept(first.status, first.headers, first.body)
                    .await;
            }

            let credentials = auth.authenticate(&first.headers).await?;
            if credentials.is_empty() {
                debug!("{line}: unauthorized, no credentials to retry with");
                return connection
                    .accept(first.status, first.headers, first.body)
                    .await;
            }

            debug!("{line}: unauthorized, retrying with credentials");
            first.body.drain().await?;
            origin
                .response(line, headers.merged(&credentials), Content::from(body))
                .send(connection)
                .await
        })
    }
}
