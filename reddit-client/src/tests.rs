#[cfg(test)]
mod tests {
    use crate::{ContentSource, RedditApiClient, RedditClient, RedditCredentials, RedditToken};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::time::{Duration, SystemTime};
    use subwatch_core::{CoreError, RedditApiError};
    use tokio::net::TcpListener;

    fn create_test_credentials() -> RedditCredentials {
        RedditCredentials {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            username: "test_user".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let rendered = format!("{:?}", create_test_credentials());
        assert!(rendered.contains("test_client_id"));
        assert!(rendered.contains("test_user"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("test_client_secret"));
    }

    #[test]
    fn test_required_scopes() {
        assert_eq!(RedditClient::get_required_scopes(), vec!["read"]);
    }

    #[tokio::test]
    async fn test_client_starts_unauthenticated() {
        let client = RedditClient::new(create_test_credentials(), "subwatch-test/1.0").unwrap();
        assert!(!client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_token_expiry() {
        let client = RedditClient::new(create_test_credentials(), "subwatch-test/1.0").unwrap();
        let now = SystemTime::now();

        let valid_token = RedditToken {
            access_token: "valid_token".to_string(),
            expires_at: now + Duration::from_secs(3600),
            scope: vec!["read".to_string()],
        };
        assert!(!valid_token.is_expired());
        client.set_token(valid_token).await;
        assert!(client.is_authenticated().await);

        // Inside the refresh margin counts as expired.
        let nearly_expired = RedditToken {
            access_token: "nearly_expired".to_string(),
            expires_at: now + Duration::from_secs(30),
            scope: vec!["read".to_string()],
        };
        assert!(nearly_expired.is_expired());
        client.set_token(nearly_expired).await;
        assert!(!client.is_authenticated().await);
    }

    /// Serves a listing endpoint that rejects every bearer token.
    async fn spawn_revoking_listing() -> String {
        let app = Router::new()
            .route("/r/:subreddit/new", get(|| async { StatusCode::UNAUTHORIZED }))
            .route("/r/:subreddit/comments", get(|| async { StatusCode::UNAUTHORIZED }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        base_url
    }

    #[tokio::test]
    async fn test_rejected_token_is_discarded() {
        let base_url = spawn_revoking_listing().await;
        let api = RedditApiClient::with_base_url("subwatch-test/1.0", &base_url).unwrap();
        let client = RedditClient::with_api_client(create_test_credentials(), api).unwrap();

        let revoked = RedditToken {
            access_token: "revoked".to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(3600),
            scope: vec!["read".to_string()],
        };

        client.set_token(revoked.clone()).await;
        assert!(client.is_authenticated().await);
        let err = client.fetch_new_posts("rust", 5).await.unwrap_err();
        assert!(matches!(err, CoreError::RedditApi(RedditApiError::InvalidToken)));
        assert!(!client.is_authenticated().await);

        client.set_token(revoked).await;
        let err = client.fetch_new_comments("rust", 5).await.unwrap_err();
        assert!(matches!(err, CoreError::RedditApi(RedditApiError::InvalidToken)));
        assert!(!client.is_authenticated().await);
    }
}
