use super::SourceQuery;
use crate::engine::LiveSnapshot;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend reported an unsuccessful listing")]
    Unsuccessful,

    #[error("Malformed listing body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Fetches the ids a listing endpoint currently reports.
pub trait ListFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        query: &'a SourceQuery,
        token: &'a str,
    ) -> BoxFuture<'a, Result<LiveSnapshot, FetchError>>;
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    success: bool,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Extracts ids from `{success, data: [{id, ...}]}`. Numeric ids are
/// stringified, entries without a usable id are skipped.
pub fn parse_listing(body: &str) -> Result<LiveSnapshot, FetchError> {
    let listing: ListingResponse = serde_json::from_str(body)?;
    if !listing.success {
        return Err(FetchError::Unsuccessful);
    }

    let ids = listing.data.iter().filter_map(|entry| match entry.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    Ok(LiveSnapshot::from_ids(ids))
}

/// Listing client for the records backend.
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn get_listing(&self, query: &SourceQuery, token: &str) -> Result<LiveSnapshot, FetchError> {
        let url = query.url(&self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&query.params)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        parse_listing(&body)
    }
}

impl ListFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        query: &'a SourceQuery,
        token: &'a str,
    ) -> BoxFuture<'a, Result<LiveSnapshot, FetchError>> {
        Box::pin(self.get_listing(query, token))
    }
}
