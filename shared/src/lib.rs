mod errors;
mod logging;
mod testing;
mod tls;

pub use errors::{CertificateError, TlsConfigError};
pub use logging::init_test_logging;
pub use testing::{TestTlsConfig, create_test_tls_config};
pub use tls::{SelfSignedCertificate, generate_self_signed_cert};
