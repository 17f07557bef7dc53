//! Shared HTTP plumbing for venue adapters.
//!
//! Every request carries a bounded timeout so a stalled venue cannot wedge
//! a fetch task forever; adapters layer their URL shapes and field mapping
//! on top of these helpers.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Result;

const USER_AGENT: &str = concat!("ratehub/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with the crate's default timeout and user agent.
#[derive(Debug, Clone)]
pub struct Http {
    client: Client,
}

impl Http {
    /// Build a client with the default 30 s request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Build a client with a custom request timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET a URL and decode the JSON response body.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`](crate::error::Error::Transport) on network or
    /// HTTP failure, including non-2xx statuses.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// POST a form-encoded body with extra headers and decode the JSON
    /// response. Used by the signed trading protocol.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`](crate::error::Error::Transport) on network or
    /// HTTP failure, including non-2xx statuses.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        body: String,
        headers: HeaderMap,
    ) -> Result<T> {
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

impl Default for Http {
    fn default() -> Self {
        Self::new()
    }
}
