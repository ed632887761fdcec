use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Extracts a token from the body of a token endpoint response.
pub trait TokenFormat: Send + Sync {
    fn token(&self, content: &[u8]) -> Result<String>;
}

impl<F> TokenFormat for F
where
    F: Fn(&[u8]) -> Result<String> + Send + Sync,
{
    fn token(&self, content: &[u8]) -> Result<String> {
        self(content)
    }
}

/// JSON body with a string `access_token` member, as returned by OAuth 2.0
/// token endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct OAuthTokenFormat;

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

impl TokenFormat for OAuthTokenFormat {
    fn token(&self, content: &[u8]) -> Result<String> {
        serde_json::from_slice::<AccessToken>(content)
            .map(|body| body.access_token)
            .map_err(|err| ClientError::TokenFormat(err.to_string()))
    }
}
