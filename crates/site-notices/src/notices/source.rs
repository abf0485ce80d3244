use std::time::Duration;

use async_trait::async_trait;

use super::domain::{Notification, NotificationEnvelope};

/// Path of the public notices endpoint, relative to the gateway base.
pub const SITE_NOTIFICATIONS_PATH: &str = "/api/v2/site-notifications";

/// Upper bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote provider of the currently active notices.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Notification>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("notice request failed: {0}")]
    Transport(String),
    #[error("notice endpoint answered with status {0}")]
    Status(u16),
    #[error("notice payload could not be decoded: {0}")]
    Decode(String),
    #[error("notice request exceeded {0:?}")]
    Timeout(Duration),
}

/// Strips a trailing `/`, `/api` or `/api/v{n}` from a configured origin.
pub fn gateway_base(origin: &str) -> &str {
    let base = origin.trim().trim_end_matches('/');

    if let Some(stripped) = base.strip_suffix("/api") {
        return stripped;
    }

    if let Some((head, version)) = base.rsplit_once('/') {
        let is_version = version
            .strip_prefix('v')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
        if is_version {
            if let Some(stripped) = head.strip_suffix("/api") {
                return stripped;
            }
        }
    }

    base
}

pub fn notifications_url(origin: &str) -> String {
    format!("{}{}", gateway_base(origin), SITE_NOTIFICATIONS_PATH)
}

/// Anonymous `GET` against the gateway's site-notifications endpoint.
#[derive(Debug, Clone)]
pub struct HttpNotificationSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpNotificationSource {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self::with_client(client, origin, timeout))
    }

    pub fn with_client(client: reqwest::Client, origin: &str, timeout: Duration) -> Self {
        Self {
            client,
            url: notifications_url(origin),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl NotificationSource for HttpNotificationSource {
    async fn fetch(&self) -> Result<Vec<Notification>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| self.map_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|err| self.map_error(err))?;
        let envelope: NotificationEnvelope =
            serde_json::from_slice(&body).map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(envelope.into_notifications())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_base_strips_api_suffixes() {
        assert_eq!(gateway_base("https://gw.example.com"), "https://gw.example.com");
        assert_eq!(gateway_base("https://gw.example.com/"), "https://gw.example.com");
        assert_eq!(gateway_base("https://gw.example.com/api"), "https://gw.example.com");
        assert_eq!(gateway_base("https://gw.example.com/api/"), "https://gw.example.com");
        assert_eq!(gateway_base("https://gw.example.com/api/v1"), "https://gw.example.com");
        assert_eq!(gateway_base("https://gw.example.com/api/v12/"), "https://gw.example.com");
    }

    #[test]
    fn gateway_base_keeps_unrelated_paths() {
        assert_eq!(
            gateway_base("https://gw.example.com/apis"),
            "https://gw.example.com/apis"
        );
        assert_eq!(
            gateway_base("https://gw.example.com/api/vnext"),
            "https://gw.example.com/api/vnext"
        );
        assert_eq!(
            gateway_base("https://gw.example.com/edge/v2"),
            "https://gw.example.com/edge/v2"
        );
    }

    #[test]
    fn notifications_url_appends_fixed_path() {
        assert_eq!(
            notifications_url("https://gw.example.com/api/v3"),
            "https://gw.example.com/api/v2/site-notifications"
        );
    }
}
