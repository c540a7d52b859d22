//! Backblaze B2 tier over the native B2 HTTP API (v2)

use crate::{ByteStream, Result, StorageTier, TierError, TierKey, TierPolicy};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Default B2 API endpoint used for account authorization
pub const DEFAULT_B2_API_URL: &str = "https://api.backblazeb2.com";

/// Page size for file name and version listings
const LIST_PAGE_SIZE: u32 = 1000;

/// Error codes B2 returns once a token has to be renewed
const EXPIRED_TOKEN_CODES: [&str; 2] = ["expired_auth_token", "bad_auth_token"];

/// Configuration for a B2 bucket tier
#[derive(Clone)]
pub struct B2Config {
    /// Application key ID (or master account ID)
    pub key_id: String,
    /// Application key
    pub application_key: String,
    /// Bucket name
    pub bucket: String,
    /// Authorization endpoint
    pub api_url: String,
    /// Connect timeout
    pub timeout: Duration,
}

impl B2Config {
    /// Create a config for a bucket with the default endpoint
    pub fn new(
        key_id: impl Into<String>,
        application_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            application_key: application_key.into(),
            bucket: bucket.into(),
            api_url: DEFAULT_B2_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Use a different authorization endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for B2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("B2Config")
            .field("key_id", &self.key_id)
            .field("bucket", &self.bucket)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Response from b2_authorize_account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub account_id: String,
    pub authorization_token: String,
    pub api_url: String,
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketInfo {
    bucket_id: String,
    bucket_name: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    buckets: Vec<BucketInfo>,
}

/// Response from b2_get_upload_url
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub authorization_token: String,
}

/// A file entry from b2_list_file_names / b2_list_file_versions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub file_name: String,
    pub file_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    files: Vec<FileEntry>,
    next_file_name: Option<String>,
    #[serde(default)]
    next_file_id: Option<String>,
}

/// Error body returned by the B2 API
#[derive(Debug, Deserialize)]
struct B2ErrorBody {
    code: String,
    message: String,
}

/// A tier backed by one B2 bucket
pub struct B2Tier {
    name: String,
    policy: TierPolicy,
    client: Client,
    config: B2Config,
    session: RwLock<AuthorizeResponse>,
    bucket_id: String,
}

/// Percent-encode each path segment, keeping `/` separators
fn encode_file_name(name: &str) -> String {
    name.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Turn a non-success response into a `TierError`
async fn api_error(response: Response, key: Option<&str>) -> TierError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: Option<B2ErrorBody> = serde_json::from_str(&text).ok();

    if status == StatusCode::NOT_FOUND {
        if let Some(key) = key {
            return TierError::NotFound(key.to_string());
        }
    }

    let message = match body {
        Some(b) => format!("{}: {}", b.code, b.message),
        None => text,
    };
    TierError::Api {
        status: status.as_u16(),
        message,
    }
}

fn is_expired_token(err: &TierError) -> bool {
    match err {
        TierError::Api {
            status: 401,
            message,
        } => EXPIRED_TOKEN_CODES
            .iter()
            .any(|code| message.starts_with(code)),
        _ => false,
    }
}

impl B2Tier {
    /// Authorize against B2 and resolve the bucket
    pub async fn new(config: B2Config, policy: TierPolicy) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| TierError::Connection(e.to_string()))?;

        let session = Self::authorize(&client, &config).await?;
        let bucket_id = Self::resolve_bucket_id(&client, &session, &config.bucket).await?;

        debug!(bucket = %config.bucket, bucket_id = %bucket_id, "B2 bucket resolved");

        Ok(Self {
            name: format!("b2:{}", config.bucket),
            policy,
            client,
            config,
            session: RwLock::new(session),
            bucket_id,
        })
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Call b2_authorize_account
    async fn authorize(client: &Client, config: &B2Config) -> Result<AuthorizeResponse> {
        let url = format!("{}/b2api/v2/b2_authorize_account", config.api_url);
        let credentials = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            config.key_id, config.application_key
        ));

        let response = client
            .get(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = api_error(response, None).await;
            return Err(TierError::Configuration(format!(
                "B2 authorization failed: {}",
                err
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TierError::Serialization(e.to_string()))
    }

    async fn session(&self) -> AuthorizeResponse {
        self.session.read().await.clone()
    }

    /// Swap in a fresh account session unless another request already did
    async fn reauthorize(&self, stale_token: &str) -> Result<AuthorizeResponse> {
        let mut session = self.session.write().await;
        if session.authorization_token == stale_token {
            debug!(bucket = %self.config.bucket, "B2 token expired, reauthorizing");
            *session = Self::authorize(&self.client, &self.config).await?;
        }
        Ok(session.clone())
    }

    async fn resolve_bucket_id(
        client: &Client,
        session: &AuthorizeResponse,
        bucket: &str,
    ) -> Result<String> {
        let url = format!("{}/b2api/v2/b2_list_buckets", session.api_url);
        let response = client
            .post(&url)
            .header("Authorization", &session.authorization_token)
            .json(&json!({ "accountId": session.account_id, "bucketName": bucket }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, None).await);
        }

        let listed: ListBucketsResponse = response
            .json()
            .await
            .map_err(|e| TierError::Serialization(e.to_string()))?;

        listed
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == bucket)
            .map(|b| b.bucket_id)
            .ok_or_else(|| TierError::Configuration(format!("B2 bucket not found: {}", bucket)))
    }

    /// POST a JSON body to a b2api operation and decode the reply,
    /// reauthorizing once if the account token has expired
    async fn api_call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let session = self.session().await;
        match self.api_call_with(&session, operation, &body).await {
            Err(e) if is_expired_token(&e) => {
                let session = self.reauthorize(&session.authorization_token).await?;
                self.api_call_with(&session, operation, &body).await
            }
            result => result,
        }
    }

    async fn api_call_with<T: DeserializeOwned>(
        &self,
        session: &AuthorizeResponse,
        operation: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/b2api/v2/{}", session.api_url, operation);
        let response = self
            .client
            .post(&url)
            .header("Authorization", &session.authorization_token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, None).await);
        }

        response
            .json()
            .await
            .map_err(|e| TierError::Serialization(e.to_string()))
    }

    async fn upload_url(&self) -> Result<UploadUrlResponse> {
        self.api_call("b2_get_upload_url", json!({ "bucketId": self.bucket_id }))
            .await
    }

    async fn download(&self, session: &AuthorizeResponse, key: &TierKey) -> Result<ByteStream> {
        let url = format!(
            "{}/file/{}/{}",
            session.download_url,
            self.config.bucket,
            encode_file_name(key.as_str())
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", &session.authorization_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, Some(key.as_str())).await);
        }

        Ok(response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed())
    }

    /// Upload through a freshly requested upload URL
    async fn upload(&self, key: &TierKey, data: Bytes, sha1: &str) -> Result<()> {
        let upload = self.upload_url().await?;

        let response = self
            .client
            .post(&upload.upload_url)
            .header("Authorization", &upload.authorization_token)
            .header("X-Bz-File-Name", encode_file_name(key.as_str()))
            .header("Content-Type", "b2/x-auto")
            .header("Content-Length", data.len().to_string())
            .header("X-Bz-Content-Sha1", sha1)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, None).await);
        }

        Ok(())
    }

    /// One page of b2_list_file_names
    async fn list_file_names(
        &self,
        prefix: &str,
        start_file_name: Option<&str>,
        max_file_count: u32,
    ) -> Result<ListFilesResponse> {
        self.api_call(
            "b2_list_file_names",
            json!({
                "bucketId": self.bucket_id,
                "prefix": prefix,
                "startFileName": start_file_name,
                "maxFileCount": max_file_count,
            }),
        )
        .await
    }

    /// Every stored version whose name starts with `prefix`
    async fn list_versions(&self, prefix: &str) -> Result<Vec<FileEntry>> {
        let mut versions = Vec::new();
        let mut start_name: Option<String> = None;
        let mut start_id: Option<String> = None;

        loop {
            let page: ListFilesResponse = self
                .api_call(
                    "b2_list_file_versions",
                    json!({
                        "bucketId": self.bucket_id,
                        "prefix": prefix,
                        "startFileName": start_name,
                        "startFileId": start_id,
                        "maxFileCount": LIST_PAGE_SIZE,
                    }),
                )
                .await?;
            versions.extend(page.files);

            match page.next_file_name {
                Some(next) => {
                    start_name = Some(next);
                    start_id = page.next_file_id;
                }
                None => break,
            }
        }

        Ok(versions)
    }
}

#[async_trait]
impl StorageTier for B2Tier {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> TierPolicy {
        self.policy
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn fetch(&self, key: &TierKey) -> Result<ByteStream> {
        let session = self.session().await;
        match self.download(&session, key).await {
            Err(e) if is_expired_token(&e) => {
                let session = self.reauthorize(&session.authorization_token).await?;
                self.download(&session, key).await
            }
            result => result,
        }
    }

    #[instrument(skip(self, data), fields(tier = %self.name, size = data.len()))]
    async fn store(&self, key: &TierKey, data: Bytes) -> Result<()> {
        let sha1 = hex::encode(Sha1::digest(&data));
        match self.upload(key, data.clone(), &sha1).await {
            // Upload tokens expire on their own; a new URL carries a new one
            Err(e) if is_expired_token(&e) => {
                debug!(key = %key, "B2 upload token expired, requesting a new upload URL");
                self.upload(key, data, &sha1).await
            }
            result => result,
        }
    }

    async fn exists(&self, key: &TierKey) -> Result<bool> {
        let page = self
            .list_file_names(key.as_str(), Some(key.as_str()), 1)
            .await?;
        Ok(page
            .files
            .first()
            .is_some_and(|f| f.file_name == key.as_str()))
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn delete(&self, key: &TierKey) -> Result<()> {
        let children = key.child_prefix();
        let targets: Vec<FileEntry> = self
            .list_versions(key.as_str())
            .await?
            .into_iter()
            .filter(|f| f.file_name == key.as_str() || f.file_name.starts_with(&children))
            .collect();

        if targets.is_empty() {
            return Err(TierError::NotFound(key.to_string()));
        }

        for file in targets {
            let Some(file_id) = file.file_id else {
                continue;
            };
            let _: serde_json::Value = self
                .api_call(
                    "b2_delete_file_version",
                    json!({ "fileName": file.file_name, "fileId": file_id }),
                )
                .await?;
        }

        Ok(())
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page = self
                .list_file_names(prefix, start.as_deref(), LIST_PAGE_SIZE)
                .await?;
            keys.extend(
                page.files
                    .into_iter()
                    .filter(|f| f.action.as_deref().map_or(true, |a| a == "upload"))
                    .map(|f| f.file_name),
            );

            match page.next_file_name {
                Some(next) => start = Some(next),
                None => break,
            }
        }

        Ok(keys)
    }
}
