use std::sync::Arc;

use crate::{errors::TlsConfigError, tls::generate_self_signed_cert};

pub struct TestTlsConfig {
    pub server_config: Arc<rustls::ServerConfig>,
}

/// Server side TLS for tests, speaking HTTP/1.1 with a fresh self-signed
/// certificate.
pub fn create_test_tls_config() -> Result<TestTlsConfig, TlsConfigError> {
    let tls_cert = generate_self_signed_cert()?;
    let crypto_provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let mut server_config = rustls::ServerConfig::builder_with_provider(crypto_provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(vec![tls_cert.cert], tls_cert.key)?;
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TestTlsConfig {
        server_config: Arc::new(server_config),
    })
}
