//! Transport settings built by layering single-field overrides over
//! [`DefaultSettings`].
//!
//! ```
//! use std::time::Duration;
//!
//! use client::{DefaultSettings, Proxy, Settings, SettingsExt};
//!
//! let settings = DefaultSettings
//!     .with_trust_all(true)
//!     .with_idle_timeout(Duration::from_secs(5))
//!     .with_proxy(Proxy::new(false, "proxy.local", 3128));
//!
//! assert!(settings.trust_all());
//! assert_eq!(settings.idle_timeout(), 5_000);
//! assert_eq!(settings.proxy().unwrap().port(), 3128);
//! assert!(!settings.follow_redirects());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP proxy all connections are routed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    secure: bool,
    host: String,
    port: u16,
}

impl Proxy {
    pub fn new(secure: bool, host: impl Into<String>, port: u16) -> Self {
        Self {
            secure,
            host: host.into(),
            port,
        }
    }

    /// Whether the proxy itself is reached over TLS.
    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Options honoured by the transport. Timeouts are in milliseconds and
/// zero means unbounded.
pub trait Settings: Send + Sync {
    fn proxy(&self) -> Option<Proxy>;

    fn trust_all(&self) -> bool;

    fn follow_redirects(&self) -> bool;

    fn connect_timeout(&self) -> u64;

    fn idle_timeout(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSettings;

impl Settings for DefaultSettings {
    fn proxy(&self) -> Option<Proxy> {
        None
    }

    fn trust_all(&self) -> bool {
        false
    }

    fn follow_redirects(&self) -> bool {
        false
    }

    fn connect_timeout(&self) -> u64 {
        0
    }

    fn idle_timeout(&self) -> u64 {
        0
    }
}

impl<S: Settings + ?Sized> Settings for &S {
    fn proxy(&self) -> Option<Proxy> {
        (**self).proxy()
    }

    fn trust_all(&self) -> bool {
        (**self).trust_all()
    }

    fn follow_redirects(&self) -> bool {
        (**self).follow_redirects()
    }

    fn connect_timeout(&self) -> u64 {
        (**self).connect_timeout()
    }

    fn idle_timeout(&self) -> u64 {
        (**self).idle_timeout()
    }
}

#[derive(Debug, Clone)]
pub struct WithProxy<S = DefaultSettings> {
    origin: S,
    proxy: Proxy,
}

impl WithProxy {
    pub fn new(proxy: Proxy) -> Self {
        Self::over(DefaultSettings, proxy)
    }
}

impl<S: Settings> WithProxy<S> {
    pub fn over(origin: S, proxy: Proxy) -> Self {
        Self { origin, proxy }
    }
}

impl<S: Settings> Settings for WithProxy<S> {
    fn proxy(&self) -> Option<Proxy> {
        Some(self.proxy.clone())
    }

    fn trust_all(&self) -> bool {
        self.origin.trust_all()
    }

    fn follow_redirects(&self) -> bool {
        self.origin.follow_redirects()
    }

    fn connect_timeout(&self) -> u64 {
        self.origin.connect_timeout()
    }

    fn idle_timeout(&self) -> u64 {
        self.origin.idle_timeout()
    }
}

#[derive(Debug, Clone)]
pub struct WithTrustAll<S = DefaultSettings> {
    origin: S,
    trust: bool,
}

impl WithTrustAll {
    pub fn new(trust: bool) -> Self {
        Self::over(DefaultSettings, trust)
    }
}

impl<S: Settings> WithTrustAll<S> {
    pub fn over(origin: S, trust: bool) -> Self {
        Self { origin, trust }
    }
}

impl<S: Settings> Settings for WithTrustAll<S> {
    fn proxy(&self) -> Option<Proxy> {
        self.origin.proxy()
    }

    fn trust_all(&self) -> bool {
        self.trust
    }

    fn follow_redirects(&self) -> bool {
        self.origin.follow_redirects()
    }

    fn connect_timeout(&self) -> u64 {
        self.origin.connect_timeout()
    }

    fn idle_timeout(&self) -> u64 {
        self.origin.idle_timeout()
    }
}

#[derive(Debug, Clone)]
pub struct WithFollowRedirects<S = DefaultSettings> {
    origin: S,
    redirect: bool,
}

impl WithFollowRedirects {
    pub fn new(redirect: bool) -> Self {
        Self::over(DefaultSettings, redirect)
    }
}

impl<S: Settings> WithFollowRedirects<S> {
    pub fn over(origin: S, redirect: bool) -> Self {
        Self { origin, redirect }
    }
}

impl<S: Settings> Settings for WithFollowRedirects<S> {
    fn proxy(&self) -> Option<Proxy> {
        self.origin.proxy()
    }

    fn trust_all(&self) -> bool {
        self.origin.trust_all()
    }

    fn follow_redirects(&self) -> bool {
        self.redirect
    }

    fn connect_timeout(&self) -> u64 {
        self.origin.connect_timeout()
    }

    fn idle_timeout(&self) -> u64 {
        self.origin.idle_timeout()
    }
}

#[derive(Debug, Clone)]
pub struct WithConnectTimeout<S = DefaultSettings> {
    origin: S,
    millis: u64,
}

impl WithConnectTimeout {
    pub fn new(millis: u64) -> Self {
        Self::over(DefaultSettings, millis)
    }

    pub fn from_duration(timeout: Duration) -> Self {
        Self::new(millis(timeout))
    }
}

impl<S: Settings> WithConnectTimeout<S> {
    pub fn over(origin: S, millis: u64) -> Self {
        Self { origin, millis }
    }
}

impl<S: Settings> Settings for WithConnectTimeout<S> {
    fn proxy(&self) -> Option<Proxy> {
        self.origin.proxy()
    }

    fn trust_all(&self) -> bool {
        self.origin.trust_all()
    }

    fn follow_redirects(&self) -> bool {
        self.origin.follow_redirects()
    }

    fn connect_timeout(&self) -> u64 {
        self.millis
    }

    fn idle_timeout(&self) -> u64 {
        self.origin.idle_timeout()
    }
}

#[derive(Debug, Clone)]
pub struct WithIdleTimeout<S = DefaultSettings> {
    origin: S,
    millis: u64,
}

impl WithIdleTimeout {
    pub fn new(millis: u64) -> Self {
        Self::over(DefaultSettings, millis)
    }

    pub fn from_duration(timeout: Duration) -> Self {
        Self::new(millis(timeout))
    }
}

impl<S: Settings> WithIdleTimeout<S> {
    pub fn over(origin: S, millis: u64) -> Self {
        Self { origin, millis }
    }
}

impl<S: Settings> Settings for WithIdleTimeout<S> {
    fn proxy(&self) -> Option<Proxy> {
        self.origin.proxy()
    }

    fn trust_all(&self) -> bool {
        self.origin.trust_all()
    }

    fn follow_redirects(&self) -> bool {
        self.origin.follow_redirects()
    }

    fn connect_timeout(&self) -> u64 {
        self.origin.connect_timeout()
    }

    fn idle_timeout(&self) -> u64 {
        self.millis
    }
}

fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Chaining helpers wrapping `self` in one more override.
pub trait SettingsExt: Settings + Sized {
    fn with_proxy(self, proxy: Proxy) -> WithProxy<Self> {
        WithProxy::over(self, proxy)
    }

    fn with_trust_all(self, trust: bool) -> WithTrustAll<Self> {
        WithTrustAll::over(self, trust)
    }

    fn with_follow_redirects(self, redirect: bool) -> WithFollowRedirects<Self> {
        WithFollowRedirects::over(self, redirect)
    }

    fn with_connect_timeout(self, timeout: Duration) -> WithConnectTimeout<Self> {
        WithConnectTimeout::over(self, millis(timeout))
    }

    fn with_idle_timeout(self, timeout: Duration) -> WithIdleTimeout<Self> {
        WithIdleTimeout::over(self, millis(timeout))
    }
}

impl<S: Settings> SettingsExt for S {}

/// Flat, deserialisable form of the settings for services that load their
/// configuration from a file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub proxy: Option<Proxy>,
    pub trust_all: bool,
    pub follow_redirects: bool,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
}

impl Settings for ClientConfig {
    fn proxy(&self) -> Option<Proxy> {
        self.proxy.clone()
    }

    fn trust_all(&self) -> bool {
        self.trust_all
    }

    fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    fn idle_timeout(&self) -> u64 {
        self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DefaultSettings;

        assert!(settings.proxy().is_none());
        assert!(!settings.trust_all());
        assert!(!settings.follow_redirects());
        assert_eq!(settings.connect_timeout(), 0);
        assert_eq!(settings.idle_timeout(), 0);
    }

    #[test]
    fn test_proxy_accessors() {
        let proxy = Proxy::new(true, "proxy.com", 8080);

        assert!(proxy.secure());
        assert_eq!(proxy.host(), "proxy.com");
        assert_eq!(proxy.port(), 8080);
    }

    #[test]
    fn test_with_proxy() {
        let proxy = Proxy::new(false, "example.com", 80);

        assert_eq!(WithProxy::new(proxy.clone()).proxy(), Some(proxy));
    }

    #[test]
    fn test_single_field_overrides() {
        for value in [true, false] {
            assert_eq!(WithTrustAll::new(value).trust_all(), value);
            assert_eq!(WithFollowRedirects::new(value).follow_redirects(), value);
        }
        for value in [0, 10, 20_000] {
            assert_eq!(WithIdleTimeout::new(value).idle_timeout(), value);
            assert_eq!(WithConnectTimeout::new(value).connect_timeout(), value);
        }
    }

    #[test]
    fn test_idle_timeout_from_duration() {
        assert_eq!(
            WithIdleTimeout::from_duration(Duration::from_secs(5)).idle_timeout(),
            5_000
        );
        assert_eq!(
            WithConnectTimeout::from_duration(Duration::from_millis(250)).connect_timeout(),
            250
        );
    }

    #[test]
    fn test_layers_forward_other_fields() {
        let settings = WithIdleTimeout::over(
            WithTrustAll::over(
                WithProxy::new(Proxy::new(false, "proxy", 3128)),
                true,
            ),
            7,
        );

        assert!(settings.trust_all());
        assert_eq!(settings.idle_timeout(), 7);
        assert_eq!(settings.proxy().map(|p| p.port()), Some(3128));
        assert!(!settings.follow_redirects());
        assert_eq!(settings.connect_timeout(), 0);
    }

    #[test]
    fn test_later_layer_wins_for_same_field() {
        let settings = DefaultSettings
            .with_trust_all(true)
            .with_follow_redirects(true)
            .with_trust_all(false);

        assert!(!settings.trust_all());
        assert!(settings.follow_redirects());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"trustAll":true,"idleTimeout":1500,"proxy":{"secure":false,"host":"squid","port":3128}}"#,
        )
        .unwrap();

        assert!(config.trust_all());
        assert!(!config.follow_redirects());
        assert_eq!(config.idle_timeout(), 1_500);
        assert_eq!(config.connect_timeout(), 0);
        assert_eq!(config.proxy(), Some(Proxy::new(false, "squid", 3128)));

        let empty: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ClientConfig::default());
    }
}
