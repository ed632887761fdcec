use std::sync::Arc;

use async_compat::Compat;
use axum::Router;
use futures::{AsyncRead, AsyncWrite};
use futures_rustls::TlsAcceptor;
use hyper::{Request, body::Incoming};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tower::Service;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(std::io::Error),

    #[error("Failed to serve connection: {0}")]
    ServeConnection(#[from] hyper::Error),
}

/// Serves HTTP/1.1 requests arriving on `cnx` with `tower_service`, after a
/// TLS handshake when `server_config` is given.
pub async fn handle_connection<IO>(
    tower_service: Router,
    server_config: Option<Arc<rustls::ServerConfig>>,
    cnx: IO,
) -> Result<(), ConnectionError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    match server_config {
        Some(server_config) => {
            let stream = TlsAcceptor::from(server_config)
                .accept(cnx)
                .await
                .map_err(ConnectionError::TlsHandshake)?;
            serve(tower_service, stream).await
        }
        None => serve(tower_service, cnx).await,
    }
}

async fn serve<IO>(tower_service: Router, stream: IO) -> Result<(), ConnectionError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let stream = TokioIo::new(Compat::new(stream));
    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
        tower_service.clone().call(request)
    });

    hyper::server::conn::http1::Builder::new()
        .serve_connection(stream, hyper_service)
        .await?;

    debug!("Connection handled successfully");
    Ok(())
}
