//! Fake upstream used by the client's integration tests: an origin issuing
//! Basic and Bearer challenges, and a forward proxy.

pub mod app;
pub mod handler;
pub mod proxy;
pub mod server;

pub use app::{Accounts, Hits};
pub use handler::{ConnectionError, handle_connection};
pub use proxy::{ForwardProxy, ProxyError};
pub use server::Upstream;
