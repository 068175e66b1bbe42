//! HTTP implementation of the `DocumentStore` trait over CouchDB.

use std::time::Duration;

use async_trait::async_trait;
use outbox_core::error::StoreError;
use outbox_core::store::{ChangeFilter, ChangeStream, Document, DocumentStore, Revision, Since};
use reqwest::header::IF_MATCH;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::changes::decode_changes;
use crate::config::CouchConfig;
use crate::design::{DESIGN_DOCUMENT_ID, design_document, filter_path, is_current};

#[derive(Debug, Deserialize)]
struct WriteResponse {
    rev: String,
}

/// CouchDB-backed document store.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct CouchDocumentStore {
    client: Client,
    base: Url,
    config: CouchConfig,
}

impl CouchDocumentStore {
    /// Creates a store for `config`. Does not touch the network.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Request` if the URL is invalid, or
    /// `StoreError::Connection` if the HTTP client cannot be built.
    pub fn new(config: CouchConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.url)
            .map_err(|e| StoreError::Request(format!("invalid CouchDB URL {}: {e}", config.url)))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Request(format!("invalid CouchDB URL {}", config.url)));
        }
        // No overall timeout: change feeds are long-lived responses.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// The database this store writes to.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Creates the database if needed and installs or refreshes the design
    /// document carrying the change-feed filters.
    ///
    /// # Errors
    ///
    /// Returns any store error; callers treat it as fatal at startup.
    #[instrument(skip(self), fields(database = %self.config.database))]
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        let response = self
            .request(Method::PUT, &[])
            .send()
            .await
            .map_err(transport)?;
        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => info!("database created"),
            StatusCode::PRECONDITION_FAILED => debug!("database already exists"),
            _ => {
                check(response, &self.config.database).await?;
            }
        }

        match self.get(DESIGN_DOCUMENT_ID).await {
            Ok(existing) if is_current(&existing.body) => {
                debug!("design document is current");
            }
            Ok(existing) => {
                self.update(DESIGN_DOCUMENT_ID, &existing.rev, design_document())
                    .await?;
                info!("design document refreshed");
            }
            Err(err) if err.is_not_found() => {
                self.insert(DESIGN_DOCUMENT_ID, design_document()).await?;
                info!("design document installed");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// URL of `/{db}/{segments...}`, with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.config.database);
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    fn document_url(&self, id: &str) -> Url {
        match id.strip_prefix("_design/") {
            Some(name) => self.url(&["_design", name]),
            None => self.url(&[id]),
        }
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.authorized(self.client.request(method, self.url(segments)))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    fn changes_url(&self, filter: ChangeFilter, since: &Since) -> Url {
        let mut url = self.url(&["_changes"]);
        let heartbeat = self.config.heartbeat.as_millis().to_string();
        let since = match since {
            Since::Beginning => "0",
            Since::Now => "now",
            Since::After(seq) => seq.as_str(),
        };
        url.query_pairs_mut()
            .append_pair("feed", "continuous")
            .append_pair("include_docs", "true")
            .append_pair("heartbeat", &heartbeat)
            .append_pair("filter", &filter_path(filter))
            .append_pair("since", since);
        url
    }

    async fn write(&self, id: &str, rev: Option<&Revision>, body: Value) -> Result<Revision, StoreError> {
        let mut builder = self.authorized(self.client.put(self.document_url(id)).json(&body));
        if let Some(rev) = rev {
            builder = builder.header(IF_MATCH, rev.as_str());
        }
        let response = builder.send().await.map_err(transport)?;
        let written: WriteResponse = check(response, id)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Revision::from(written.rev))
    }
}

#[async_trait]
impl DocumentStore for CouchDocumentStore {
    #[instrument(skip(self, body))]
    async fn insert(&self, id: &str, body: Value) -> Result<Revision, StoreError> {
        let rev = self.write(id, None, body).await?;
        debug!(rev = %rev, "document inserted");
        Ok(rev)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let response = self
            .authorized(self.client.get(self.document_url(id)))
            .send()
            .await
            .map_err(transport)?;
        let body: Value = check(response, id)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let rev = body
            .get("_rev")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Serialization(format!("document {id} has no _rev")))?;
        Ok(Document {
            id: id.to_owned(),
            rev: Revision::from(rev),
            body,
        })
    }

    #[instrument(skip(self, body), fields(rev = %rev))]
    async fn update(&self, id: &str, rev: &Revision, body: Value) -> Result<Revision, StoreError> {
        let new_rev = self.write(id, Some(rev), body).await?;
        debug!(new_rev = %new_rev, "document updated");
        Ok(new_rev)
    }

    #[instrument(skip(self), fields(filter = filter.name()))]
    async fn subscribe(&self, filter: ChangeFilter, since: Since) -> Result<ChangeStream, StoreError> {
        let response = self
            .authorized(self.client.get(self.changes_url(filter, &since)))
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, "_changes").await?;
        debug!(since = ?since, "change feed opened");
        Ok(decode_changes(response.bytes_stream()))
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Connection(err.to_string())
}

/// Maps CouchDB status codes onto `StoreError`.
async fn check(response: Response, id: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => StoreError::Conflict { id: id.to_owned() },
        StatusCode::NOT_FOUND => StoreError::NotFound { id: id.to_owned() },
        StatusCode::BAD_REQUEST => StoreError::Request(format!("{id}: {detail}")),
        status if status.is_server_error() => {
            StoreError::Connection(format!("{id}: server returned {status}: {detail}"))
        }
        status => StoreError::Request(format!("{id}: server returned {status}: {detail}")),
    })
}
