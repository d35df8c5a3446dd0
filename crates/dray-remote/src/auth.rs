use std::time::Duration;

use anyhow::Context;
use dray_core::config::BackendConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The signed-in backend user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
}

/// An authenticated session, as returned by the password grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(backend: &BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed building HTTP client for the auth API")?;

        Ok(Self {
            http,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
        })
    }

    #[instrument(skip(self, password), fields(email = email))]
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let url = format!("{}/auth/v1/token", self.base_url);

        let response = self
            .http
            .post(&url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .context("failed requesting the password grant")?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "login rejected");
            anyhow::bail!("login failed: {status}");
        }

        let session: Session = response
            .json()
            .await
            .context("failed decoding the session payload")?;

        info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    /// Remote sign-out is best effort; the caller clears the stored
    /// session regardless of the outcome here.
    #[instrument(skip(self, session))]
    pub async fn logout(&self, session: &Session) {
        let url = format!("{}/auth/v1/logout", self.base_url);

        let result = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", session.access_token),
            )
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => info!("signed out"),
            Ok(response) => {
                warn!(status = %response.status(), "remote sign-out rejected")
            }
            Err(error) => warn!(error = %error, "remote sign-out failed"),
        }
    }
}
