use super::service_account::ServiceAccountTokens;
use super::{SummaryStore, DEFAULT_SUMMARY_PATH};
use crate::error::{RelayError, Result, Upstream};
use crate::types::StorySummary;
use crate::upstream::{build_client, ensure_success, parse_json, request_failed, trim_base_url};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Part of the 400 body the REST API sends when the path lacks `.indexOn`
const MISSING_INDEX: &str = "Index not defined";

/// How requests to the database are authorized.
#[derive(Debug, Clone)]
enum DatabaseAuth {
    /// No credential; the security rules must allow public access.
    Open,
    /// Legacy database secret or Firebase ID token, sent as `auth=`.
    Secret(String),
    /// Service account OAuth2 token, sent as `access_token=`.
    ServiceAccount(Arc<ServiceAccountTokens>),
}

/// Summary log kept in a Firebase Realtime Database, through its REST API.
///
/// Entries are pushed under `{database_url}/{path}` with a server-side
/// timestamp. The latest is read back with `orderBy="timestamp"` and
/// `limitToLast=1`; databases without an `.indexOn: "timestamp"` rule on
/// the path reject that query, and the store then scans the collection.
#[derive(Debug, Clone)]
pub struct FirebaseSummaryStore {
    client: Client,
    database_url: String,
    path: String,
    auth: DatabaseAuth,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Deserialize)]
struct Entry {
    summary: String,
    timestamp: i64,
}

type Entries = Option<HashMap<String, Entry>>;

impl FirebaseSummaryStore {
    pub fn new(database_url: &str, auth: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(Upstream::Database, timeout)?,
            database_url: trim_base_url(database_url),
            path: DEFAULT_SUMMARY_PATH.to_string(),
            auth: auth.map_or(DatabaseAuth::Open, DatabaseAuth::Secret),
        })
    }

    /// Authorize as a service account instead of with a database secret.
    pub fn with_service_account(mut self, tokens: Arc<ServiceAccountTokens>) -> Self {
        self.auth = DatabaseAuth::ServiceAccount(tokens);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into().trim_matches('/').to_string();
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/{}.json", self.database_url, self.path)
    }

    async fn auth_query(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(match &self.auth {
            DatabaseAuth::Open => Vec::new(),
            DatabaseAuth::Secret(secret) => vec![("auth", secret.clone())],
            DatabaseAuth::ServiceAccount(tokens) => {
                vec![("access_token", tokens.access_token().await?)]
            }
        })
    }

    async fn get(&self, extra: &[(&'static str, String)]) -> Result<Response> {
        let mut query = self.auth_query().await?;
        query.extend_from_slice(extra);

        self.client
            .get(self.collection_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| request_failed(Upstream::Database, e))
    }

    /// Whole collection, for databases that cannot order by timestamp.
    async fn scan(&self) -> Result<Entries> {
        let response = ensure_success(Upstream::Database, self.get(&[]).await?).await?;
        parse_json(Upstream::Database, response).await
    }
}

#[async_trait]
impl SummaryStore for FirebaseSummaryStore {
    async fn append(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(self.collection_url())
            .query(&self.auth_query().await?)
            .json(&json!({
                "summary": text,
                "timestamp": { ".sv": "timestamp" },
            }))
            .send()
            .await
            .map_err(|e| request_failed(Upstream::Database, e))?;

        let response = ensure_success(Upstream::Database, response).await?;
        let pushed: PushResponse = parse_json(Upstream::Database, response).await?;
        info!("Summary stored with ID: {}", pushed.name);
        Ok(pushed.name)
    }

    async fn latest(&self) -> Result<Option<StorySummary>> {
        let response = self
            .get(&[
                ("orderBy", "\"timestamp\"".to_string()),
                ("limitToLast", "1".to_string()),
            ])
            .await?;

        // An empty collection comes back as JSON `null`
        let entries: Entries = if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if !body.contains(MISSING_INDEX) {
                return Err(RelayError::provider(
                    Upstream::Database,
                    format!("HTTP {}: {}", StatusCode::BAD_REQUEST, body.trim()),
                ));
            }
            warn!(
                "No .indexOn rule for \"timestamp\" at /{}; scanning all summaries",
                self.path
            );
            self.scan().await?
        } else {
            let response = ensure_success(Upstream::Database, response).await?;
            parse_json(Upstream::Database, response).await?
        };

        let Some((key, entry)) = entries
            .unwrap_or_default()
            .into_iter()
            .max_by_key(|(_, entry)| entry.timestamp)
        else {
            debug!("No summaries found");
            return Ok(None);
        };

        let created_at = Utc
            .timestamp_millis_opt(entry.timestamp)
            .single()
            .ok_or_else(|| {
                RelayError::provider(
                    Upstream::Database,
                    format!("Summary {} has invalid timestamp {}", key, entry.timestamp),
                )
            })?;

        Ok(Some(StorySummary {
            key,
            text: entry.summary,
            created_at,
        }))
    }
}
