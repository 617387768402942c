//! Remote sync service boundary.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use super::types::{SyncError, SyncOperation, SyncQueueItem};
use crate::round::BlockDraft;

/// The remote backend the outbox drains into.
///
/// Implementations report connectivity loss as [`SyncError::Offline`],
/// retryable failures as [`SyncError::Transient`] and refused payloads as
/// [`SyncError::Rejected`].
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Apply one queued write.
    async fn push(&self, item: &SyncQueueItem) -> Result<(), SyncError>;

    /// Blocks stored remotely for `user_id` on `date`.
    async fn fetch_blocks(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<BlockDraft>, SyncError>;
}

/// JSON-over-HTTP remote.
///
/// - `POST {base}/blocks` with a block payload
/// - `PUT {base}/users/{id}` and `PUT {base}/profiles/{user_id}`
/// - `GET {base}/blocks?user_id=..&date=YYYY-MM-DD`
pub struct HttpRemote {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpRemote {
    /// # Errors
    /// Returns [`SyncError::InvalidEndpoint`] for a malformed base URL.
    pub fn new(base: &str, token: Option<String>) -> Result<Self, SyncError> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            token,
        })
    }

    fn url(&self, path: &str) -> Result<Url, SyncError> {
        Ok(self.base.join(path)?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Map a non-success status to the retry class.
fn classify(status: StatusCode, body: String) -> SyncError {
    let message = format!("{status}: {body}");
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        SyncError::Transient(message)
    } else {
        SyncError::Rejected(message)
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn push(&self, item: &SyncQueueItem) -> Result<(), SyncError> {
        let request = match &item.operation {
            SyncOperation::UpsertBlock(block) => self.client.post(self.url("blocks")?).json(block),
            SyncOperation::UpsertUser(user) => self
                .client
                .put(self.url(&format!("users/{}", user.id))?)
                .json(user),
            SyncOperation::UpsertProfile(profile) => self
                .client
                .put(self.url(&format!("profiles/{}", profile.user_id()))?)
                .json(profile),
        };
        let resp = self
            .authorize(request)
            .header("Idempotency-Key", &item.id)
            .send()
            .await?;

        let status = resp.status();
        debug!(item_id = %item.id, op = item.operation.kind(), %status, "push response");
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify(status, body))
    }

    async fn fetch_blocks(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<BlockDraft>, SyncError> {
        let mut url = self.url("blocks")?;
        url.query_pairs_mut()
            .append_pair("user_id", &user_id.to_string())
            .append_pair("date", &date.format("%Y-%m-%d").to_string());

        let resp = self.authorize(self.client.get(url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessType;
    use chrono::Utc;

    fn block_item() -> SyncQueueItem {
        let now = Utc::now();
        SyncQueueItem {
            id: "item-1".into(),
            operation: SyncOperation::UpsertBlock(BlockDraft {
                id: Some("block-1".into()),
                user_id: 4,
                process: ProcessType::Guides,
                round: 2,
                date: now.date_naive(),
                started_at: now,
                ended_at: now,
                duration_min: 25,
                elapsed_minutes: 0,
                fields: [("realizado".to_string(), 3)].into(),
            }),
            attempts: 0,
            created_at: now,
            next_attempt_at: None,
            last_error: None,
        }
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, String::new()),
            SyncError::Transient(_)
        ));
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, String::new()),
            SyncError::Transient(_)
        ));
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            SyncError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn push_posts_block_with_idempotency_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/blocks")
            .match_header("idempotency-key", "item-1")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "id": "block-1",
                "round": 2,
                "fields": { "realizado": 3 }
            })))
            .with_status(201)
            .create_async()
            .await;

        let remote =
            HttpRemote::new(&format!("{}/api", server.url()), Some("secret".into())).unwrap();
        remote.push(&block_item()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn push_maps_server_errors_to_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/blocks")
            .with_status(503)
            .create_async()
            .await;

        let remote = HttpRemote::new(&server.url(), None).unwrap();
        let err = remote.push(&block_item()).await.unwrap_err();
        assert!(matches!(err, SyncError::Transient(_)));
    }

    #[tokio::test]
    async fn fetch_blocks_decodes_drafts() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::to_string(&vec![match block_item().operation {
            SyncOperation::UpsertBlock(b) => b,
            _ => unreachable!(),
        }])
        .unwrap();
        server
            .mock("GET", "/blocks")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("user_id".into(), "4".into()),
                mockito::Matcher::UrlEncoded("date".into(), "2024-05-06".into()),
            ]))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let remote = HttpRemote::new(&server.url(), None).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let drafts = remote.fetch_blocks(4, date).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id.as_deref(), Some("block-1"));
    }
}
