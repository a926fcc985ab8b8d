use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use log::debug;
use reqwest::{
    Client,
    header::{COOKIE, HeaderMap, HeaderValue},
};

use crate::http::{
    DEFAULT_RETRY_DELAY_MS, DEFAULT_TEAM_API_URL, DEFAULT_TIMEOUT_MS, ReqwestTransport,
    ResilientClient, RetryPolicy,
};

/// Default interval between polls of a watched endpoint, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Name of the RoboRegistry login session cookie.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Everything needed to build the shared client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin of the RoboRegistry site; relative endpoints resolve against it.
    pub base_url: Option<String>,
    pub team_api_url: String,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub user_agent: String,
    /// Value of the logged-in `session` cookie, needed by most `/api` routes.
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            team_api_url: DEFAULT_TEAM_API_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            user_agent: format!("roboregistry-cli/{}", env!("CARGO_PKG_VERSION")),
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.timeout.is_zero(), "Timeout must be greater than zero");
        ensure!(
            !self.retry_delay.is_zero(),
            "Retry delay must be greater than zero"
        );
        ensure!(
            !self.poll_interval.is_zero(),
            "Poll interval must be greater than zero"
        );
        ensure!(
            !self.team_api_url.is_empty(),
            "Team API URL must not be empty"
        );
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.timeout, self.retry_delay)
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(session) = &self.session_cookie {
            let mut value = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE_NAME, session))
                .context("Session cookie contains invalid characters")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
            debug!("Using session cookie: {}", mask_secret(session));
        }
        Ok(headers)
    }

    pub fn build_http_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(&self.user_agent)
            .default_headers(self.default_headers()?)
            .build()
            .context("Failed to build HTTP client")
    }

    /// Validates the configuration and builds the one client the
    /// application shares.
    pub fn build_client(&self) -> Result<Arc<ResilientClient>> {
        self.validate()?;
        let transport = ReqwestTransport::new(self.build_http_client()?);
        let mut client = ResilientClient::new(transport, self.retry_policy())
            .with_team_api_url(self.team_api_url.clone());
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(Arc::new(client))
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
