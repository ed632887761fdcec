//! [`ClientSlices`] backed by hyper's HTTP/1.1 client connections.
//!
//! Every exchange opens its own connection: TCP via smol, TLS via
//! futures-rustls, optionally through a forward proxy. The request body is
//! read fully before anything is sent; the response body is streamed.

mod connector;
mod tls;

use std::sync::Arc;

use async_compat::Compat;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use http_body_util::{BodyExt, Full};
use hyper::{
    Method, Request, StatusCode, Uri,
    body::Incoming,
    header::{
        AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, HeaderName, LOCATION,
        PROXY_AUTHORIZATION, TRANSFER_ENCODING,
    },
};
use hyper_util::rt::TokioIo;
use tracing::{debug, warn};

use self::connector::{Connector, Origin, with_timeout};
use crate::{
    content::Content,
    error::{ClientError, Result},
    headers::Headers,
    line::RequestLine,
    settings::Settings,
    slice::{AsyncResponse, Parts, Response, RsFull, Slice},
    slices::ClientSlices,
};

/// Redirects followed for one request before giving up.
pub const MAX_REDIRECTS: usize = 8;

/// Transport configured once from [`Settings`] and shared by every slice it
/// hands out.
#[derive(Clone)]
pub struct HyperClientSlices {
    transport: Arc<Transport>,
}

impl HyperClientSlices {
    pub fn new(settings: impl Settings) -> Result<Self> {
        let tls = tls::client_config(settings.trust_all())?;
        let transport = Transport {
            connector: Connector::new(tls, settings.proxy(), settings.connect_timeout()),
            follow_redirects: settings.follow_redirects(),
            idle_timeout: settings.idle_timeout(),
        };
        Ok(Self {
            transport: Arc::new(transport),
        })
    }

    fn slice(&self, secure: bool, host: &str, port: Option<u16>) -> Arc<dyn Slice> {
        Arc::new(HyperSlice {
            transport: self.transport.clone(),
            origin: Origin::new(secure, host, port),
        })
    }
}

impl ClientSlices for HyperClientSlices {
    fn http(&self, host: &str, port: Option<u16>) -> Arc<dyn Slice> {
        self.slice(false, host, port)
    }

    fn https(&self, host: &str, port: Option<u16>) -> Arc<dyn Slice> {
        self.slice(true, host, port)
    }
}

struct HyperSlice {
    transport: Arc<Transport>,
    origin: Origin,
}

impl Slice for HyperSlice {
    fn response(&self, line: RequestLine, headers: Headers, body: Content) -> Box<dyn Response> {
        let transport = self.transport.clone();
        let origin = self.origin.clone();
        AsyncResponse::new(Box::pin(async move {
            let Parts {
                status,
                headers,
                body,
            } = transport.exchange(origin, line, headers, body).await?;
            Ok(RsFull::new(status)
                .with_headers(headers)
                .with_body(body)
                .boxed())
        }))
        .boxed()
    }
}

struct Transport {
    connector: Connector,
    follow_redirects: bool,
    idle_timeout: u64,
}

impl Transport {
    async fn exchange(
        &self,
        mut origin: Origin,
        line: RequestLine,
        mut headers: Headers,
        body: Content,
    ) -> Result<Parts> {
        if !line.is_standard() {
            return Err(ClientError::InvalidRequestLine(format!(
                "unsupported method '{}'",
                line.method()
            )));
        }
        let mut method = line.method().clone();
        let mut target = line.target().to_string();
        let mut body = body.bytes().await?;
        let mut hops = 0;

        loop {
            let parts = self
                .send(&origin, &method, &target, &headers, body.clone())
                .await?;
            if !self.follow_redirects || !is_redirect(parts.status) {
                return Ok(parts);
            }
            let Some(location) = parts.headers.get(LOCATION.as_str()).map(str::to_string) else {
                return Ok(parts);
            };
            parts.body.drain().await?;
            if hops == MAX_REDIRECTS {
                return Err(ClientError::TooManyRedirects(MAX_REDIRECTS));
            }

            debug!("{} {target}: following {} to {location}", method, parts.status);
            let (next, next_target) = resolve(&origin, &target, &location)?;
            if next != origin {
                headers = without(headers, &[AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE, HOST]);
            }
            if switches_to_get(parts.status, &method) {
                method = Method::GET;
                body = Bytes::new();
                headers = without(headers, &[CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING]);
            }
            (origin, target) = (next, next_target);
            hops += 1;
        }
    }

    async fn send(
        &self,
        origin: &Origin,
        method: &Method,
        target: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Result<Parts> {
        let stream = self.connector.connect(origin).await?;
        let (mut sender, conn) =
            hyper::client::conn::http1::handshake(TokioIo::new(Compat::new(stream)))
                .await
                .map_err(ClientError::Handshake)?;

        smol::spawn(async move {
            if let Err(err) = conn.await {
                warn!("connection failed: {err}");
            }
        })
        .detach();

        let path = if target.starts_with('/') {
            target.to_string()
        } else {
            format!("/{target}")
        };
        let uri = if self.connector.forwards(origin) {
            format!("{}://{}{path}", origin.scheme(), origin.authority())
        } else {
            path
        };

        let mut request = Request::builder().method(method.clone()).uri(uri);
        for header in headers {
            request = request.header(header.name(), header.value());
        }
        if !headers.contains(HOST.as_str()) {
            request = request.header(HOST, origin.host_header());
        }
        let request = request.body(Full::new(body))?;

        let response = with_timeout(self.idle_timeout, "waiting for the response", async {
            sender
                .send_request(request)
                .await
                .map_err(ClientError::RequestFailed)
        })
        .await?;

        Ok(Parts {
            status: response.status(),
            headers: Headers::from(response.headers()),
            body: content(response.into_body(), self.idle_timeout),
        })
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Whether following a redirect with `status` turns `method` into a
/// bodiless `GET`: always for `303`, and for a `POST` answered with `301` or
/// `302`.
fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    }
}

fn without(headers: Headers, names: &[HeaderName]) -> Headers {
    headers
        .into_iter()
        .filter(|header| !names.iter().any(|name| header.is(name.as_str())))
        .collect()
}

/// Origin and target a `Location` value points to, relative to the request
/// that received it.
fn resolve(origin: &Origin, target: &str, location: &str) -> Result<(Origin, String)> {
    let invalid = || ClientError::InvalidLocation(location.to_string());
    let location = location.split('#').next().unwrap_or_default();

    let absolute = if location.starts_with("//") {
        Some(format!("{}:{location}", origin.scheme()))
    } else if location.contains("://") {
        Some(location.to_string())
    } else {
        None
    };
    if let Some(absolute) = absolute {
        let uri = absolute.parse::<Uri>().map_err(|_| invalid())?;
        let secure = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => return Err(invalid()),
        };
        let host = uri.host().ok_or_else(invalid)?;
        let target = match uri.query() {
            Some(query) => format!("{}?{query}", uri.path()),
            None => uri.path().to_string(),
        };
        return Ok((Origin::new(secure, host, uri.port_u16()), target));
    }

    if location.starts_with('/') {
        return Ok((origin.clone(), location.to_string()));
    }

    let path = target.split(['?', '#']).next().unwrap_or_default();
    let directory = match path.rfind('/') {
        Some(pos) => &path[..=pos],
        None => "/",
    };
    Ok((origin.clone(), format!("{directory}{location}")))
}

/// Streams the data frames of `body`, waiting at most `idle_timeout` for
/// each of them.
fn content(body: Incoming, idle_timeout: u64) -> Content {
    let frames = body.into_data_stream().map_err(ClientError::Body).boxed();
    Content::from_stream(stream::unfold(Some(frames), move |frames| async move {
        let mut frames = frames?;
        let next = with_timeout(idle_timeout, "reading the response body", async {
            Ok(frames.next().await)
        })
        .await;
        match next {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(frames))),
            Ok(Some(Err(err))) | Err(err) => Some((Err(err), None)),
            Ok(None) => None,
        }
    }))
}
