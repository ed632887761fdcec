//! Request/response contract shared by every component.
//!
//! A [`Slice`] maps a request to a [`Response`]. A response does nothing
//! until it is sent to a [`Connection`]; only then does the I/O behind it
//! run, and the connection receives status, headers and body exactly once.

use std::sync::Arc;

use futures::future::BoxFuture;
use hyper::StatusCode;

use crate::{
    content::Content,
    error::{ClientError, Result},
    headers::Headers,
    line::RequestLine,
};

pub trait Slice: Send + Sync {
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response>;
}

pub trait Response: Send {
    /// Runs the exchange and delivers its outcome to `connection`.
    fn send<'a>(self: Box<Self>, connection: &'a mut dyn Connection) -> BoxFuture<'a, Result<()>>;
}

/// Sink receiving the outcome of a [`Response`].
pub trait Connection: Send {
    fn accept(
        &mut self,
        status: StatusCode,
        headers: Headers,
        body: Content,
    ) -> BoxFuture<'_, Result<()>>;
}

impl<F> Slice for F
where
    F: Fn(RequestLine, Headers, Content) -> Box<dyn Response> + Send + Sync,
{
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response> {
        self(line, headers, body)
    }
}

impl<S: Slice + ?Sized> Slice for Arc<S> {
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response> {
        (**self).response(line, headers, body)
    }
}

/// Response with a known status, headers and body.
#[derive(Debug)]
pub struct RsFull {
    status: StatusCode,
    headers: Headers,
    body: Content,
}

impl RsFull {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Content::empty(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Content>) -> Self {
        self.body = body.into();
        self
    }

    pub fn boxed(self) -> Box<dyn Response> {
        Box::new(self)
    }
}

impl Response for RsFull {
    fn send<'a>(self: Box<Self>, connection: &'a mut dyn Connection) -> BoxFuture<'a, Result<()>> {
        let Self {
            status,
            headers,
            body,
        } = *self;
        connection.accept(status, headers, body)
    }
}

/// Response resolved by a future, e.g. after some asynchronous preparation.
pub struct AsyncResponse {
    pending: BoxFuture<'static, Result<Box<dyn Response>>>,
}

impl AsyncResponse {
    pub fn new(pending: BoxFuture<'static, Result<Box<dyn Response>>>) -> Self {
        Self { pending }
    }

    pub fn boxed(self) -> Box<dyn Response> {
        Box::new(self)
    }
}

impl Response for AsyncResponse {
    fn send<'a>(self: Box<Self>, connection: &'a mut dyn Connection) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let response = self.pending.await?;
            response.send(connection).await
        })
    }
}

/// Outcome of a response as seen by a connection.
#[derive(Debug)]
pub struct Parts {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Content,
}

/// Connection that keeps what it was handed, refusing a second delivery.
#[derive(Debug, Default)]
struct Capture {
    parts: Option<Parts>,
}

impl Connection for Capture {
    fn accept(
        &mut self,
        status: StatusCode,
        headers: Headers,
        body: Content,
    ) -> BoxFuture<'_, Result<()>> {
        let result = if self.parts.is_some() {
            Err(ClientError::DeliveredTwice)
        } else {
            self.parts = Some(Parts {
                status,
                headers,
                body,
            });
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// Drives `response` and returns what it delivered. The body is handed back
/// unread.
pub async fn receive(response: Box<dyn Response>) -> Result<Parts> {
    let mut capture = Capture::default();
    response.send(&mut capture).await?;
    capture.parts.ok_or(ClientError::NotDelivered)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hyper::Method;

    use super::*;

    struct Twice;

    impl Response for Twice {
        fn send<'a>(
            self: Box<Self>,
            connection: &'a mut dyn Connection,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                connection
                    .accept(StatusCode::OK, Headers::new(), Content::empty())
                    .await?;
                connection
                    .accept(StatusCode::OK, Headers::new(), Content::empty())
                    .await
            })
        }
    }

    struct Never;

    impl Response for Never {
        fn send<'a>(self: Box<Self>, _: &'a mut dyn Connection) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_closure_is_a_slice() {
        smol::block_on(async {
            let slice = |line: RequestLine, headers: Headers, body: Content| {
                assert_eq!(line.target(), "/hello");
                RsFull::new(StatusCode::CREATED)
                    .with_headers(headers)
                    .with_body(body)
                    .boxed()
            };

            let parts = receive(slice.response(
                RequestLine::new(Method::POST, "/hello"),
                Headers::from([("X-Header", "The Value")]),
                Content::from("payload"),
            ))
            .await
            .unwrap();

            assert_eq!(parts.status, StatusCode::CREATED);
            assert_eq!(parts.headers.get("x-header"), Some("The Value"));
            assert_eq!(parts.body.bytes().await.unwrap().as_ref(), b"payload");
        });
    }

    #[test]
    fn test_response_is_lazy() {
        smol::block_on(async {
            let prepared = Arc::new(AtomicUsize::new(0));
            let counter = prepared.clone();
            let response = AsyncResponse::new(Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RsFull::ok().boxed())
            }))
            .boxed();

            assert_eq!(prepared.load(Ordering::SeqCst), 0);

            let parts = receive(response).await.unwrap();
            assert_eq!(parts.status, StatusCode::OK);
            assert_eq!(prepared.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn test_dropped_response_does_no_work() {
        let prepared = Arc::new(AtomicUsize::new(0));
        let counter = prepared.clone();
        let response = AsyncResponse::new(Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RsFull::ok().boxed())
        }));

        drop(response);

        assert_eq!(prepared.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_receive_enforces_single_delivery() {
        smol::block_on(async {
            assert!(matches!(
                receive(Box::new(Twice)).await,
                Err(ClientError::DeliveredTwice)
            ));
            assert!(matches!(
                receive(Box::new(Never)).await,
                Err(ClientError::NotDelivered)
            ));
        });
    }
}
