use std::{net::SocketAddr, sync::Arc};

use smol::net::TcpListener;
use tracing::{debug, warn};

use crate::{
    app::{Accounts, AppState, Hits, get_app},
    handler::handle_connection,
};

/// Fake upstream origin listening on an ephemeral loopback port.
pub struct Upstream {
    addr: SocketAddr,
    secure: bool,
    hits: Arc<Hits>,
}

impl Upstream {
    /// Starts serving plain HTTP, or HTTPS when `server_config` is given.
    /// The accept loop runs detached for as long as the process lives.
    pub async fn start(
        accounts: Accounts,
        server_config: Option<Arc<rustls::ServerConfig>>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let secure = server_config.is_some();
        let hits = Arc::new(Hits::default());

        let upstream = Self {
            addr,
            secure,
            hits: hits.clone(),
        };
        let app = get_app(AppState::new(accounts, &upstream.base_url(), hits));

        smol::spawn(async move {
            loop {
                let (cnx, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("upstream stopped accepting: {err}");
                        break;
                    }
                };
                let tower_service = app.clone();
                let server_config = server_config.clone();
                smol::spawn(async move {
                    if let Err(err) = handle_connection(tower_service, server_config, cnx).await {
                        warn!("error serving connection from {peer}: {err}");
                    }
                })
                .detach();
            }
        })
        .detach();

        debug!("upstream listening on {}", upstream.base_url());
        Ok(upstream)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.addr)
    }

    pub fn hits(&self) -> &Hits {
        &self.hits
    }
}
