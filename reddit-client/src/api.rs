use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use subwatch_core::{ContentItem, ContentKind, CoreError, RedditApiError};
use tracing::{debug, error, info, warn};

pub(crate) const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_WEB_BASE: &str = "https://reddit.com";

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

impl<T> RedditListing<T> {
    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.data.children.into_iter().map(|child| child.data)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub body: String,
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
}

fn timestamp_from_epoch(created_utc: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(created_utc as i64, 0).unwrap_or_else(Utc::now)
}

fn permalink_url(permalink: &str) -> String {
    format!("{}{}", REDDIT_WEB_BASE, permalink)
}

impl From<RedditPostData> for ContentItem {
    fn from(post: RedditPostData) -> Self {
        Self {
            post_id: post.name,
            subreddit: post.subreddit,
            author: post.author,
            title: post.title,
            content: post.selftext,
            url: permalink_url(&post.permalink),
            timestamp: timestamp_from_epoch(post.created_utc),
            kind: ContentKind::Post,
        }
    }
}

impl From<RedditCommentData> for ContentItem {
    fn from(comment: RedditCommentData) -> Self {
        Self {
            post_id: comment.name,
            subreddit: comment.subreddit,
            author: comment.author,
            title: String::new(),
            content: comment.body,
            url: permalink_url(&comment.permalink),
            timestamp: timestamp_from_epoch(comment.created_utc),
            kind: ContentKind::Comment,
        }
    }
}

/// Thin authenticated wrapper around the listing endpoints. Token handling
/// lives in [`crate::RedditClient`].
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        Self::with_base_url(user_agent, REDDIT_API_BASE)
    }

    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth())),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    async fn make_request(
        &self,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let waited = self.rate_limiter.acquire().await;
        let budget = self.rate_limiter.status().await;
        debug!(
            ?waited,
            remaining = budget.available_tokens,
            per_minute = budget.requests_per_minute,
            endpoint,
            "Rate limiter cleared request"
        );

        info!("Making Reddit API request: GET {}", endpoint);
        let response = self
            .http_client
            .request(Method::GET, &url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for {}: {}", endpoint, e);
                if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(status_error(status, &response, endpoint).into())
    }

    async fn get_listing<T>(
        &self,
        access_token: &str,
        subreddit: &str,
        path: &str,
        limit: u32,
    ) -> Result<RedditListing<T>, CoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let endpoint = format!("/r/{}/{}", subreddit, path);
        let params = [("limit", limit.to_string()), ("raw_json", "1".to_string())];

        let response = self
            .make_request(&endpoint, access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }) => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        response.json().await.map_err(|e| {
            error!("Failed to parse {} listing: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse {} for r/{}", path, subreddit),
            })
        })
    }

    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let listing: RedditListing<RedditPostData> = self
            .get_listing(access_token, subreddit, "new", limit)
            .await?;
        let items: Vec<ContentItem> = listing.into_items().map(ContentItem::from).collect();
        info!("Retrieved {} posts from r/{}", items.len(), subreddit);
        Ok(items)
    }

    pub async fn get_new_comments(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let listing: RedditListing<RedditCommentData> = self
            .get_listing(access_token, subreddit, "comments", limit)
            .await?;
        let items: Vec<ContentItem> = listing.into_items().map(ContentItem::from).collect();
        info!("Retrieved {} comments from r/{}", items.len(), subreddit);
        Ok(items)
    }
}

fn status_error(status: StatusCode, response: &Response, endpoint: &str) -> RedditApiError {
    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => RedditApiError::SubredditNotFound {
            subreddit: endpoint.to_string(),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => RedditApiError::InvalidResponse {
            details: format!("Unexpected status {} for {}", code, endpoint),
        },
    }
}
