use crate::models::{
    message::{MessageRow, NewMessage},
    setting::SettingRow,
    user::UserRow,
};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, header};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};
use url::Url;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Failures reported by the remote store and the push channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connectivity(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, StoreError::Rejected { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Connectivity(e.to_string())
        }
    }
}

impl From<url::ParseError> for StoreError {
    fn from(e: url::ParseError) -> Self {
        StoreError::Connectivity(format!("invalid store url: {}", e))
    }
}

/// Bulk queries and inserts against the message and settings tables.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// All messages ordered by insertion timestamp, oldest first.
    async fn fetch_messages(&self) -> Result<Vec<MessageRow>, StoreError>;

    async fn insert_message(&self, message: &NewMessage) -> Result<(), StoreError>;

    /// Stored avatar per requested id. Ids with no user row are absent;
    /// users without a picture map to `None`.
    async fn fetch_avatars(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, StoreError>;

    async fn fetch_setting(&self, key: &str) -> Result<Option<bool>, StoreError>;

    async fn update_setting(&self, key: &str, value: bool) -> Result<(), StoreError>;
}

/// Location and key of the hosted store.
#[derive(Clone, Debug)]
pub struct StoreEndpoint {
    pub base_url: Url,
    pub api_key: String,
}

impl StoreEndpoint {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn join(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(path)?)
    }

    /// Websocket endpoint of the realtime service.
    pub fn realtime_url(&self) -> Result<Url, StoreError> {
        let mut url = self.join("realtime/v1/websocket")?;
        let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
        url.set_scheme(scheme)
            .map_err(|_| StoreError::Connectivity("cannot derive websocket url".to_string()))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }
}

/// REST client for the hosted relational store.
#[derive(Clone)]
pub struct RestStore {
    client: ReqwestClient,
    endpoint: StoreEndpoint,
}

#[derive(Deserialize)]
struct SettingValue {
    value: bool,
}

#[derive(Serialize)]
struct SettingPatch {
    value: bool,
}

impl RestStore {
    pub fn new(endpoint: StoreEndpoint) -> Result<Self, StoreError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&endpoint.api_key)
            .map_err(|e| StoreError::Connectivity(format!("invalid api key: {}", e)))?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", endpoint.api_key))
            .map_err(|e| StoreError::Connectivity(format!("invalid api key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);

        let client = ReqwestClient::builder()
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &StoreEndpoint {
        &self.endpoint
    }

    pub(crate) fn client(&self) -> &ReqwestClient {
        &self.client
    }

    pub(crate) fn table(&self, table: &str) -> Result<Url, StoreError> {
        self.endpoint.join(&format!("rest/v1/{}", table))
    }

    /// Sends the request and turns non-success statuses into `Rejected`.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// PostgREST `in` list with every id quoted.
fn in_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl FeedStore for RestStore {
    async fn fetch_messages(&self) -> Result<Vec<MessageRow>, StoreError> {
        let mut url = self.table("messages")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "inserted_at.asc");

        let rows = self
            .execute(self.client.get(url))
            .await?
            .json::<Vec<MessageRow>>()
            .await?;
        tracing::debug!("Fetched {} messages", rows.len());
        Ok(rows)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        let url = self.table("messages")?;
        let request = self
            .client
            .post(url)
            .header("Prefer", "return=minimal")
            .json(&[message]);
        self.execute(request).await?;
        tracing::info!("Message inserted (broadcast: {})", message.is_broadcast);
        Ok(())
    }

    async fn fetch_avatars(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut url = self.table("users")?;
        url.query_pairs_mut()
            .append_pair("select", "id,profile_picture")
            .append_pair("id", &in_list(ids));

        let rows = self
            .execute(self.client.get(url))
            .await?
            .json::<Vec<UserRow>>()
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id, row.profile_picture))
            .collect())
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let mut url = self.table("settings")?;
        url.query_pairs_mut()
            .append_pair("select", "value")
            .append_pair("key", &format!("eq.{}", key));

        let rows = self
            .execute(self.client.get(url))
            .await?
            .json::<Vec<SettingValue>>()
            .await?;
        Ok(rows.into_iter().next().map(|row| row.value))
    }

    async fn update_setting(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut url = self.table("settings")?;
        url.query_pairs_mut().append_pair("key", &format!("eq.{}", key));

        let request = self
            .client
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&SettingPatch { value });
        let rows = self
            .execute(request)
            .await?
            .json::<Vec<SettingRow>>()
            .await?;
        // Row-level security filters the update silently instead of failing.
        if rows.is_empty() {
            return Err(StoreError::Rejected {
                status: 403,
                message: format!("setting {} was not updated", key),
            });
        }
        tracing::info!("Setting {} set to {}", key, value);
        Ok(())
    }
}
