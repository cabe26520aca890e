//! REST client for the company store.
//!
//! The store is an external service exposing `GET/POST /companies` and
//! `PUT/DELETE /companies/{id}`. Only the bulk load is bound by a timeout.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::company::Company;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Request timeout - server is not responding")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("{status} {reason}")]
    Status { status: u16, reason: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            StoreError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            }
        } else {
            StoreError::Network(err)
        }
    }
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Company>, StoreError>;
    async fn create(&self, company: &Company) -> Result<Company, StoreError>;
    async fn update(&self, id: u64, company: &Company) -> Result<Company, StoreError>;
    async fn delete(&self, id: u64) -> Result<(), StoreError>;
}

pub struct RestStore {
    http: Client,
    base_url: String,
    load_timeout: Duration,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, load_timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            load_timeout,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/companies", self.base_url)
    }

    fn record_url(&self, id: u64) -> String {
        format!("{}/companies/{id}", self.base_url)
    }
}

fn check_status(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        Ok(res)
    } else {
        Err(StoreError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl CompanyStore for RestStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Company>, StoreError> {
        let res = self
            .http
            .get(self.collection_url())
            .timeout(self.load_timeout)
            .send()
            .await?;
        let companies: Vec<Company> = check_status(res)?.json().await?;
        debug!("Fetched {} companies", companies.len());
        Ok(companies)
    }

    #[instrument(skip_all, fields(name = %company.name))]
    async fn create(&self, company: &Company) -> Result<Company, StoreError> {
        let mut body = company.clone();
        body.id = None;
        let res = self
            .http
            .post(self.collection_url())
            .json(&body)
            .send()
            .await?;
        let created: Company = check_status(res)?.json().await?;
        if created.id.is_none() {
            return Err(StoreError::Decode("created record carries no id".into()));
        }
        Ok(created)
    }

    #[instrument(skip(self, company))]
    async fn update(&self, id: u64, company: &Company) -> Result<Company, StoreError> {
        let mut body = company.clone();
        body.id = Some(id);
        let res = self
            .http
            .put(self.record_url(id))
            .json(&body)
            .send()
            .await?;
        check_status(res)?;
        // The response body is only an acknowledgement; the sent record is
        // what the store now holds.
        Ok(body)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let res = self.http.delete(self.record_url(id)).send().await?;
        check_status(res)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let store = RestStore::new("http://localhost:3001/", Duration::from_secs(1));
        assert_eq!(store.collection_url(), "http://localhost:3001/companies");
        assert_eq!(store.record_url(4), "http://localhost:3001/companies/4");
    }

    #[test]
    fn status_error_reads_like_http() {
        let err = StoreError::Status {
            status: 500,
            reason: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "500 Internal Server Error");
        assert_eq!(
            StoreError::Timeout.to_string(),
            "Request timeout - server is not responding"
        );
    }
}
