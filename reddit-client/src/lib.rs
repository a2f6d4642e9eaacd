pub mod api;
pub mod rate_limiter;

#[cfg(test)]
mod tests;

pub use api::RedditApiClient;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, ResourceOwnerPassword,
    ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use subwatch_core::{required_env, ConfigError, ContentItem, CoreError, RedditApiError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
/// Tokens are refreshed this long before Reddit says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where monitored content comes from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_new_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError>;

    async fn fetch_new_comments(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError>;
}

/// Script-app credentials for the password grant.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RedditCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: required_env("REDDIT_CLIENT_ID")?,
            client_secret: required_env("REDDIT_CLIENT_SECRET")?,
            username: required_env("REDDIT_USERNAME")?,
            password: required_env("REDDIT_PASSWORD")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

pub struct RedditClient {
    oauth: BasicClient,
    credentials: RedditCredentials,
    api: RedditApiClient,
    token: Mutex<Option<RedditToken>>,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials, user_agent: &str) -> Result<Self, CoreError> {
        Self::with_api_client(credentials, RedditApiClient::new(user_agent)?)
    }

    /// Uses `api` for listing requests, e.g. one pointed at another host.
    pub fn with_api_client(
        credentials: RedditCredentials,
        api: RedditApiClient,
    ) -> Result<Self, CoreError> {
        let oauth = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(invalid_url)?,
            Some(TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(invalid_url)?),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth,
            credentials,
            api,
            token: Mutex::new(None),
        })
    }

    /// Builds a client from `REDDIT_*` environment variables.
    pub fn from_env(user_agent: &str) -> Result<Self, CoreError> {
        let credentials = RedditCredentials::from_env()?;
        Self::new(credentials, user_agent)
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        vec!["read"]
    }

    pub async fn set_token(&self, token: RedditToken) {
        *self.token.lock().await = Some(token);
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_expired())
    }

    /// Runs the password grant and caches the resulting token.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        let http = self.api.http_client().clone();
        let username = ResourceOwnerUsername::new(self.credentials.username.clone());
        let password = ResourceOwnerPassword::new(self.credentials.password.clone());
        let mut request = self.oauth.exchange_password(&username, &password);
        for scope in Self::get_required_scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let response = request
            .request_async(move |req| send_oauth_request(http, req))
            .await
            .map_err(|e| RedditApiError::AuthenticationFailed {
                reason: e.to_string(),
            })?;

        let expires_in = response
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));
        let token = RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + expires_in,
            scope: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        };

        info!(
            username = %self.credentials.username,
            expires_in_secs = expires_in.as_secs(),
            "Authenticated with Reddit"
        );
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        {
            let guard = self.token.lock().await;
            if let Some(token) = guard.as_ref().filter(|token| !token.is_expired()) {
                return Ok(token.access_token.clone());
            }
        }
        debug!("Reddit token missing or expired, authenticating");
        Ok(self.authenticate().await?.access_token)
    }

    /// A 401 means Reddit revoked the token, so the next request logs in again.
    async fn drop_rejected_token<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            warn!("Reddit rejected the cached access token, discarding it");
            *self.token.lock().await = None;
        }
        result
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn fetch_new_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let token = self.access_token().await?;
        let result = self.api.get_new_posts(&token, subreddit, limit).await;
        self.drop_rejected_token(result).await
    }

    async fn fetch_new_comments(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let token = self.access_token().await?;
        let result = self.api.get_new_comments(&token, subreddit, limit).await;
        self.drop_rejected_token(result).await
    }
}

fn invalid_url(err: oauth2::url::ParseError) -> CoreError {
    CoreError::Internal {
        message: format!("invalid Reddit OAuth URL: {err}"),
    }
}

/// Sends token requests through our own client so Reddit sees the
/// configured User-Agent.
async fn send_oauth_request(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
