use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{marker::PhantomData, time::Duration};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response has no Last-Modified header")]
    MissingLastModified,
    #[error("invalid Last-Modified header '{0}': {1}")]
    InvalidLastModified(String, chrono::ParseError),
}

/// Retrieves snapshots from one upstream endpoint.
///
/// [`Fetcher::fetch`] may be expensive, callers should only use it after
/// [`Fetcher::last_modified`] reported data newer than what they hold.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Output: Send + Sync + 'static;

    async fn last_modified(&self) -> Result<DateTime<Utc>, FetchError>;
    async fn fetch(&self) -> Result<Self::Output, FetchError>;
}

/// Fetches a JSON array of records over HTTP, using `HEAD` + `Last-Modified`
/// as the freshness check. Array elements that do not decode as `R` are
/// skipped.
pub struct HttpFetcher<R> {
    client: reqwest::Client,
    url: Url,
    _record: PhantomData<fn() -> R>,
}

impl<R> HttpFetcher<R> {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            _record: PhantomData,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl<R> Fetcher for HttpFetcher<R>
where
    R: DeserializeOwned + Send + Sync + 'static,
{
    type Output = Vec<R>;

    async fn last_modified(&self) -> Result<DateTime<Utc>, FetchError> {
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await?
            .error_for_status()?;
        let header = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .ok_or(FetchError::MissingLastModified)?;
        let value = header
            .to_str()
            .map_err(|_| FetchError::MissingLastModified)?;
        let last_modified = DateTime::parse_from_rfc2822(value)
            .map_err(|err| FetchError::InvalidLastModified(value.to_string(), err))?;
        Ok(last_modified.with_timezone(&Utc))
    }

    async fn fetch(&self) -> Result<Vec<R>, FetchError> {
        let start = std::time::Instant::now();
        let values: Vec<Value> = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let total = values.len();
        let records: Vec<R> = decode_records(&self.url, values);
        tracing::debug!(
            url = %self.url,
            records = records.len(),
            took = ?start.elapsed(),
            "fetched content"
        );
        if records.len() < total {
            tracing::warn!(
                url = %self.url,
                skipped = total - records.len(),
                total,
                "skipped records that could not be decoded"
            );
        }
        Ok(records)
    }
}

fn decode_records<R: DeserializeOwned>(url: &Url, values: Vec<Value>) -> Vec<R> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(url = %url, index, error = %err, "invalid record");
                None
            }
        })
        .collect()
}
