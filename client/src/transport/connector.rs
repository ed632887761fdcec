use std::{sync::Arc, time::Duration};

use async_compat::Compat;
use bytes::Bytes;
use futures::{AsyncRead, AsyncWrite};
use futures_rustls::TlsConnector;
use http_body_util::Empty;
use hyper::{Method, Request, header::HOST};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use smol::{Timer, net::TcpStream};
use tracing::{debug, warn};

use crate::{
    error::{ClientError, Result},
    settings::Proxy,
    slices::{HTTP_PORT, HTTPS_PORT},
};

pub(crate) trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// Byte stream to an origin: plain TCP, TLS, or either of them tunnelled
/// through a proxy.
pub(crate) type Stream = Box<dyn Io>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Origin {
    pub secure: bool,
    pub host: String,
    pub port: u16,
}

impl Origin {
    pub fn new(secure: bool, host: &str, port: Option<u16>) -> Self {
        let default = if secure { HTTPS_PORT } else { HTTP_PORT };
        Self {
            secure,
            host: host.to_string(),
            port: port.unwrap_or(default),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// `host:port`, as used by `CONNECT` and absolute-form targets.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value for the `Host` header; the port is omitted when it is the
    /// scheme's default.
    pub fn host_header(&self) -> String {
        let default = if self.secure { HTTPS_PORT } else { HTTP_PORT };
        if self.port == default {
            self.host.clone()
        } else {
            self.authority()
        }
    }
}

/// Bare host for name resolution and SNI; IPv6 literals lose their brackets.
fn bare_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host)
}

/// Runs `future`, failing with [`ClientError::Timeout`] after `millis`
/// milliseconds. Zero waits forever.
pub(crate) async fn with_timeout<T>(
    millis: u64,
    waiting: &'static str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    if millis == 0 {
        return future.await;
    }
    smol::future::or(future, async move {
        Timer::after(Duration::from_millis(millis)).await;
        Err(ClientError::Timeout(waiting))
    })
    .await
}

pub(crate) struct Connector {
    tls: TlsConnector,
    proxy: Option<Proxy>,
    connect_timeout: u64,
}

impl Connector {
    pub fn new(
        tls: Arc<rustls::ClientConfig>,
        proxy: Option<Proxy>,
        connect_timeout: u64,
    ) -> Self {
        Self {
            tls: TlsConnector::from(tls),
            proxy,
            connect_timeout,
        }
    }

    /// Whether requests to `origin` go to a proxy in absolute-form instead
    /// of through a tunnel.
    pub fn forwards(&self, origin: &Origin) -> bool {
        self.proxy.is_some() && !origin.secure
    }

    pub async fn connect(&self, origin: &Origin) -> Result<Stream> {
        let Some(proxy) = &self.proxy else {
            debug!("connecting to {}://{}", origin.scheme(), origin.authority());
            let tcp = self.tcp(&origin.host, origin.port).await?;
            return if origin.secure {
                self.handshake(&origin.host, Box::new(tcp)).await
            } else {
                Ok(Box::new(tcp))
            };
        };

        debug!(
            "connecting to {}://{} through proxy {}:{}",
            origin.scheme(),
            origin.authority(),
            proxy.host(),
            proxy.port()
        );
        let tcp: Stream = Box::new(self.tcp(proxy.host(), proxy.port()).await?);
        let stream = if proxy.secure() {
            self.handshake(proxy.host(), tcp).await?
        } else {
            tcp
        };
        if !origin.secure {
            return Ok(stream);
        }
        let tunnel = tunnel(stream, origin).await?;
        self.handshake(&origin.host, tunnel).await
    }

    async fn tcp(&self, host: &str, port: u16) -> Result<TcpStream> {
        with_timeout(self.connect_timeout, "connecting", async {
            TcpStream::connect((bare_host(host), port))
                .await
                .map_err(ClientError::Connect)
        })
        .await
    }

    async fn handshake(&self, host: &str, stream: Stream) -> Result<Stream> {
        let name = ServerName::try_from(bare_host(host).to_string())
            .map_err(|_| ClientError::InvalidServerName(host.to_string()))?;
        let stream = self
            .tls
            .connect(name, stream)
            .await
            .map_err(ClientError::TlsHandshake)?;
        Ok(Box::new(stream))
    }
}

/// Asks the proxy on the other end of `stream` for a `CONNECT` tunnel to
/// `origin` and returns the tunnelled stream.
async fn tunnel(stream: Stream, origin: &Origin) -> Result<Stream> {
    let stream = TokioIo::new(Compat::new(stream));
    let (mut sender, conn) = hyper::client::conn::http1::handshake(stream)
        .await
        .map_err(ClientError::Handshake)?;

    smol::spawn(async move {
        if let Err(err) = conn.with_upgrades().await {
            warn!("proxy connection failed: {err}");
        }
    })
    .detach();

    let authority = origin.authority();
    let request = Request::builder()
        .method(Method::CONNECT)
        .uri(authority.as_str())
        .header(HOST, authority.as_str())
        .body(Empty::<Bytes>::new())?;

    let response = sender
        .send_request(request)
        .await
        .map_err(ClientError::RequestFailed)?;
    if !response.status().is_success() {
        return Err(ClientError::ProxyTunnel(format!(
            "CONNECT {authority} answered {}",
            response.status()
        )));
    }

    let upgraded = hyper::upgrade::on(response)
        .await
        .map_err(ClientError::RequestFailed)?;
    debug!("tunnel to {authority} established");
    Ok(Box::new(Compat::new(TokioIo::new(upgraded))))
}
