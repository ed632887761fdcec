use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_compat::Compat;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, combinators::UnsyncBoxBody};
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    http::uri::{Authority, PathAndQuery},
};
use hyper_util::rt::TokioIo;
use smol::net::{TcpListener, TcpStream};
use thiserror::Error;
use tracing::{debug, warn};

type ProxyBody = UnsyncBoxBody<Bytes, hyper::Error>;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Request target '{0}' names no authority")]
    NoAuthority(String),

    #[error("Failed to reach {0}: {1}")]
    Connect(String, std::io::Error),

    #[error("Upstream exchange failed: {0}")]
    Upstream(#[from] hyper::Error),

    #[error("Invalid forwarded target: {0}")]
    Target(#[from] hyper::http::uri::InvalidUri),
}

/// Forward HTTP proxy: `CONNECT` opens a raw tunnel, absolute-form requests
/// are forwarded in origin-form over a fresh connection.
pub struct ForwardProxy {
    addr: SocketAddr,
    relayed: Arc<AtomicUsize>,
}

impl ForwardProxy {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let relayed = Arc::new(AtomicUsize::new(0));

        let counter = relayed.clone();
        smol::spawn(async move {
            loop {
                let (cnx, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("proxy stopped accepting: {err}");
                        break;
                    }
                };
                smol::spawn(serve(cnx, peer, counter.clone())).detach();
            }
        })
        .detach();

        debug!("forward proxy listening on {addr}");
        Ok(Self { addr, relayed })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Tunnels opened plus requests forwarded so far.
    pub fn relayed(&self) -> usize {
        self.relayed.load(Ordering::SeqCst)
    }
}

async fn serve(cnx: TcpStream, peer: SocketAddr, relayed: Arc<AtomicUsize>) {
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        let relayed = relayed.clone();
        async move { Ok::<_, Infallible>(route(request, relayed).await) }
    });

    if let Err(err) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(Compat::new(cnx)), service)
        .with_upgrades()
        .await
    {
        warn!("error serving proxy connection from {peer}: {err}");
    }
}

async fn route(request: Request<Incoming>, relayed: Arc<AtomicUsize>) -> Response<ProxyBody> {
    let result = if request.method() == Method::CONNECT {
        tunnel(request).await
    } else {
        forward(request).await
    };
    match result {
        Ok(response) => {
            relayed.fetch_add(1, Ordering::SeqCst);
            response
        }
        Err(err) => {
            warn!("proxy failure: {err}");
            let mut response = Response::new(empty());
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response
        }
    }
}

fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn authority(request: &Request<Incoming>) -> Result<Authority, ProxyError> {
    request
        .uri()
        .authority()
        .cloned()
        .ok_or_else(|| ProxyError::NoAuthority(request.uri().to_string()))
}

async fn connect(authority: &Authority, default_port: u16) -> Result<TcpStream, ProxyError> {
    let port = authority.port_u16().unwrap_or(default_port);
    TcpStream::connect((authority.host(), port))
        .await
        .map_err(|err| ProxyError::Connect(authority.to_string(), err))
}

async fn tunnel(request: Request<Incoming>) -> Result<Response<ProxyBody>, ProxyError> {
    let authority = authority(&request)?;
    let target = connect(&authority, 443).await?;
    debug!("tunnelling to {authority}");

    smol::spawn(async move {
        let upgraded = match hyper::upgrade::on(request).await {
            Ok(upgraded) => upgraded,
            Err(err) => {
                warn!("tunnel upgrade failed: {err}");
                return;
            }
        };
        let mut client = TokioIo::new(upgraded);
        let mut target = Compat::new(target);
        if let Err(err) = tokio::io::copy_bidirectional(&mut client, &mut target).await {
            debug!("tunnel to {authority} closed: {err}");
        }
    })
    .detach();

    Ok(Response::new(empty()))
}

async fn forward(mut request: Request<Incoming>) -> Result<Response<ProxyBody>, ProxyError> {
    let authority = authority(&request)?;
    let target = connect(&authority, 80).await?;
    let (mut sender, conn) =
        hyper::client::conn::http1::handshake(TokioIo::new(Compat::new(target))).await?;
    smol::spawn(async move {
        if let Err(err) = conn.await {
            warn!("forwarded connection failed: {err}");
        }
    })
    .detach();

    let path = request
        .uri()
        .path_and_query()
        .map(PathAndQuery::as_str)
        .unwrap_or("/")
        .parse::<hyper::Uri>()?;
    debug!("forwarding {} {path} to {authority}", request.method());
    *request.uri_mut() = path;

    let response = sender.send_request(request).await?;
    Ok(response.map(BodyExt::boxed_unsync))
}
