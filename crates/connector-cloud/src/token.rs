//! OAuth access token cache and refresh: tokens are refreshed on 401 and
//! once before expiry. The token endpoint itself is an external
//! collaborator; this module only specifies the shape of the exchange.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::CloudApiError;

#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    expires_at: Instant,
}

impl Token {
    /// A small safety margin so a token that is about to expire is refreshed
    /// proactively rather than racing a request against its expiry.
    const EXPIRY_SKEW: Duration = Duration::from_secs(30);

    fn new(access_token: String, expires_in: Duration) -> Self {
        Token {
            access_token,
            expires_at: Instant::now() + expires_in,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() + Self::EXPIRY_SKEW >= self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: u64,
}

pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

pub async fn refresh(
    http: &reqwest::Client,
    config: &OAuthConfig,
) -> Result<Token, CloudApiError> {
    let res = http
        .post(&config.token_url)
        .form(&RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: &config.refresh_token,
            client_id: &config.client_id,
            client_secret: &config.client_secret,
        })
        .send()
        .await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(CloudApiError::Auth(format!("http {status}: {body}")));
    }

    let body: RefreshResponse = res.json().await?;
    Ok(Token::new(body.access_token, Duration::from_secs(body.expires_in)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_expired() {
        let token = Token::new("abc".to_string(), Duration::from_secs(3600));
        assert!(!token.is_expired());
    }

    #[test]
    fn token_within_skew_window_is_expired() {
        let token = Token::new("abc".to_string(), Duration::from_secs(5));
        assert!(token.is_expired());
    }
}
