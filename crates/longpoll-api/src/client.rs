//! HTTP binding for the API methods the long poll loop needs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::types::{Group, GroupsById, LongPollServer};

pub const DEFAULT_BASE_URL: &str = "https://api.vk.com";
pub const DEFAULT_API_VERSION: &str = "5.199";

/// Source of long poll server credentials.
///
/// The poll loop only ever talks to the API through this trait, so tests can
/// swap the HTTP binding for an in-memory double.
#[async_trait]
pub trait LongPollApi: Send + Sync {
    /// Issue a fresh server/key/ts triple for `group_id`.
    async fn get_long_poll_server(&self, group_id: i64) -> Result<LongPollServer>;

    /// Resolve the group the current access token belongs to.
    async fn current_group_id(&self) -> Result<i64>;
}

#[async_trait]
impl<T: LongPollApi + ?Sized> LongPollApi for Arc<T> {
    async fn get_long_poll_server(&self, group_id: i64) -> Result<LongPollServer> {
        (**self).get_long_poll_server(group_id).await
    }

    async fn current_group_id(&self) -> Result<i64> {
        (**self).current_group_id().await
    }
}

/// Authenticated API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    access_token: String,
    base_url: String,
    version: String,
    /// Language of localized fields in responses
    lang: Option<String>,
}

impl ApiClient {
    /// Create a client for `access_token` against the public API endpoint
    pub fn new(access_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent(format!("longpoll-api/{}", crate::VERSION))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            lang: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sent as the `lang` parameter of every call, e.g. `en` or `ru`
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Share an existing HTTP client (connection pool, proxy settings)
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn http_client(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Call an API method and unwrap its `response` envelope
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/method/{}", self.base_url, method);
        debug!(method, "calling API method");

        let mut request = self.http.get(&url).query(&[
            ("access_token", self.access_token.as_str()),
            ("v", self.version.as_str()),
        ]);
        if let Some(lang) = &self.lang {
            request = request.query(&[("lang", lang.as_str())]);
        }

        let response = request
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        match envelope {
            Envelope {
                error: Some(error), ..
            } => Err(ApiError::Api {
                code: error.error_code,
                message: error.error_msg,
            }),
            Envelope {
                response: Some(response),
                ..
            } => Ok(response),
            _ => Err(ApiError::EmptyResponse(method.to_string())),
        }
    }

    /// `groups.getLongPollServer`
    pub async fn groups_get_long_poll_server(&self, group_id: i64) -> Result<LongPollServer> {
        self.call(
            "groups.getLongPollServer",
            &[("group_id", group_id.to_string())],
        )
        .await
    }

    /// `groups.getById` for the group owning the access token
    pub async fn groups_get_by_id(&self) -> Result<Vec<Group>> {
        let groups: GroupsById = self.call("groups.getById", &[]).await?;
        Ok(groups.into_groups())
    }
}

#[async_trait]
impl LongPollApi for ApiClient {
    async fn get_long_poll_server(&self, group_id: i64) -> Result<LongPollServer> {
        self.groups_get_long_poll_server(group_id).await
    }

    async fn current_group_id(&self) -> Result<i64> {
        self.groups_get_by_id()
            .await?
            .first()
            .map(|group| group.id)
            .ok_or_else(|| ApiError::EmptyResponse("groups.getById".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}
