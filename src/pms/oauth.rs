//! Client-credentials OAuth2 token manager shared by PMS adapters. Caches
//! the access token alongside its expiry, refreshes proactively inside a
//! 60-second window, and serializes refreshes per connector instance so
//! concurrent callers don't stampede the token endpoint.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Error;

const REFRESH_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Holds the current token and serializes refreshes. Construct one per
/// connector instance (not shared across tenants with different
/// credentials).
pub struct OAuthTokenManager {
    token_url: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl OAuthTokenManager {
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, refreshing if absent or within the
    /// skew window of expiry.
    pub async fn access_token(&self) -> Result<String, Error> {
        let mut guard = self.cached.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at - Utc::now() > chrono::Duration::from_std(REFRESH_SKEW).unwrap() {
                return Ok(token.access_token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    /// Force a refresh regardless of cached expiry, used on a 401 response
    /// before retrying the call once.
    pub async fn force_refresh(&self) -> Result<String, Error> {
        let mut guard = self.cached.lock().await;
        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, Error> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await
            .map_err(|e| Error::transient(format!("PMS token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "PMS token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::External(format!("PMS token response malformed: {e}")))?;

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_skew_is_under_a_minute() {
        assert_eq!(REFRESH_SKEW, Duration::from_secs(60));
    }
}
