use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use subwatch_core::{
    CoreError, FetchSummary, MonitorConfig, MonitoredPost, MonitoredSubreddit, PostStatus,
};
use tracing::debug;

/// `GET /api/config` body: the stored config plus its rendered prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub config: MonitorConfig,
    pub open_ai_prompt: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct Deleted {
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct Updated {
    updated: u64,
}

/// Thin client for the subwatch REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_posts(&self) -> Result<Vec<MonitoredPost>, CoreError> {
        let resp = self.http.get(self.url("/api/posts")).send().await?;
        read_json(resp).await
    }

    pub async fn list_subreddits(&self) -> Result<Vec<MonitoredSubreddit>, CoreError> {
        let resp = self.http.get(self.url("/api/subreddits")).send().await?;
        read_json(resp).await
    }

    pub async fn add_subreddit(&self, name: &str) -> Result<MonitoredSubreddit, CoreError> {
        let resp = self
            .http
            .post(self.url("/api/subreddits"))
            .json(&json!({ "name": name, "isActive": true }))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn remove_subreddit(&self, id: i64) -> Result<(), CoreError> {
        let resp = self
            .http
            .delete(self.url(&format!("/api/subreddits/{id}")))
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn set_subreddit_active(&self, id: i64, is_active: bool) -> Result<(), CoreError> {
        let resp = self
            .http
            .patch(self.url(&format!("/api/subreddits/{id}/status")))
            .json(&json!({ "isActive": is_active }))
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn set_post_status(&self, id: i64, status: PostStatus) -> Result<(), CoreError> {
        let resp = self
            .http
            .patch(self.url(&format!("/api/posts/{id}/status")))
            .json(&json!({ "status": status }))
            .send()
            .await?;
        expect_success(resp).await
    }

    pub async fn update_reply(&self, id: i64, reply: &str) -> Result<MonitoredPost, CoreError> {
        let resp = self
            .http
            .patch(self.url(&format!("/api/posts/{id}/update-reply")))
            .json(&json!({ "suggestedReply": reply }))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn regenerate_reply(&self, id: i64) -> Result<MonitoredPost, CoreError> {
        let resp = self
            .http
            .post(self.url(&format!("/api/posts/{id}/regenerate-reply")))
            .send()
            .await?;
        read_json(resp).await
    }

    /// Deletes pending posts and returns how many went.
    pub async fn clear_pending(&self) -> Result<u64, CoreError> {
        let resp = self.http.delete(self.url("/api/posts")).send().await?;
        Ok(read_json::<Deleted>(resp).await?.deleted)
    }

    pub async fn ignore_all(&self) -> Result<u64, CoreError> {
        let resp = self
            .http
            .patch(self.url("/api/posts/ignore-all"))
            .send()
            .await?;
        Ok(read_json::<Updated>(resp).await?.updated)
    }

    pub async fn get_config(&self) -> Result<ConfigResponse, CoreError> {
        let resp = self.http.get(self.url("/api/config")).send().await?;
        read_json(resp).await
    }

    pub async fn save_config(&self, config: &MonitorConfig) -> Result<(), CoreError> {
        let resp = self
            .http
            .put(self.url("/api/config"))
            .json(config)
            .send()
            .await?;
        expect_success(resp).await
    }

    /// Triggers a fetch run. Partial failures still return the summary.
    pub async fn fetch(&self) -> Result<FetchSummary, CoreError> {
        let resp = self.http.post(self.url("/api/fetch")).send().await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, CoreError> {
    let resp = check_status(resp).await?;
    Ok(resp.json().await?)
}

async fn expect_success(resp: Response) -> Result<(), CoreError> {
    check_status(resp).await.map(|_| ())
}

async fn check_status(resp: Response) -> Result<Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %body, "API request failed");
    Err(api_failure(status.as_u16(), &body))
}

fn api_failure(status: u16, body: &str) -> CoreError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string());
    match status {
        400 => CoreError::InvalidInput { message },
        404 => CoreError::NotFound { resource: message },
        409 => CoreError::Conflict { message },
        _ => CoreError::Internal {
            message: format!("HTTP {status}: {message}"),
        },
    }
}
