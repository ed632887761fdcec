use std::sync::Arc;

use crate::slice::Slice;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

/// Factory of slices bound to one origin. A missing port means the scheme's
/// default ([`HTTP_PORT`] or [`HTTPS_PORT`]).
pub trait ClientSlices: Send + Sync {
    fn http(&self, host: &str, port: Option<u16>) -> Arc<dyn Slice>;

    fn https(&self, host: &str, port: Option<u16>) -> Arc<dyn Slice>;
}

impl<C: ClientSlices + ?Sized> ClientSlices for Arc<C> {
    fn http(&self, host: &str, port: Option<u16>) -> Arc<dyn Slice> {
        (**self).http(host, port)
    }

    fn https(&self, host: &str, port: Option<u16>) -> Arc<dyn Slice> {
        (**self).https(host, port)
    }
}
