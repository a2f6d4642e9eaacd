use api::AppState;
use async_trait::async_trait;
use background_service::Fetcher;
use chrono::Utc;
use database::Database;
use llm_interface::LlmProvider;
use reddit_client::ContentSource;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use subwatch_core::{
    ContentItem, ContentKind, CoreError, LlmError, RedditApiError, Verdict, VerdictKind,
    VerdictOutcome,
};
use tokio::net::TcpListener;

/// Serves canned listings; subreddits without an entry return 404 upstream.
#[derive(Default)]
struct CannedSource {
    listings: HashMap<String, Vec<ContentItem>>,
}

impl CannedSource {
    fn with(mut self, subreddit: &str, titles: &[(&str, &str)]) -> Self {
        let items = titles
            .iter()
            .map(|(post_id, title)| ContentItem {
                post_id: post_id.to_string(),
                subreddit: subreddit.to_string(),
                author: "poster".to_string(),
                title: title.to_string(),
                content: "Looking for advice".to_string(),
                url: format!("https://reddit.com/r/{subreddit}/comments/{post_id}/"),
                timestamp: Utc::now(),
                kind: ContentKind::Post,
            })
            .collect();
        self.listings.insert(subreddit.to_string(), items);
        self
    }
}

#[async_trait]
impl ContentSource for CannedSource {
    async fn fetch_new_posts(
        &self,
        subreddit: &str,
        _limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        self.listings.get(subreddit).cloned().ok_or_else(|| {
            RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            }
            .into()
        })
    }

    async fn fetch_new_comments(
        &self,
        _subreddit: &str,
        _limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        Ok(Vec::new())
    }
}

/// Uses the item title as the score.
struct TitleAnalyzer {
    reply_fails: bool,
}

#[async_trait]
impl LlmProvider for TitleAnalyzer {
    fn verdict_kind(&self) -> VerdictKind {
        VerdictKind::Reply
    }

    async fn analyze(&self, text: &str, _system_prompt: &str) -> Result<Verdict, CoreError> {
        let title = text.lines().next().unwrap_or_default();
        let score: f64 = title.parse().unwrap_or(1.0);
        Ok(Verdict {
            score: Verdict::clamp_score(score),
            analysis: "Relevant request".to_string(),
            outcome: VerdictOutcome::SuggestedReply("Initial reply".to_string()),
        })
    }

    async fn suggest_reply(&self, _text: &str, _system_prompt: &str) -> Result<String, CoreError> {
        if self.reply_fails {
            return Err(LlmError::ServiceUnavailable {
                provider: "openai".to_string(),
            }
            .into());
        }
        Ok("Regenerated reply".to_string())
    }
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    server: tokio::task::JoinHandle<()>,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn json(&self, path: &str) -> Value {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json body")
    }

    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

async fn spawn_app(
    source: Result<Arc<dyn ContentSource>, String>,
    analyzer: Result<Arc<dyn LlmProvider>, String>,
) -> TestApp {
    let path = std::env::temp_dir().join(format!("test_api_{}.db", uuid::Uuid::new_v4()));
    let database = Database::connect_url(&format!("sqlite://{}", path.display()), 2)
        .await
        .expect("connect");
    database.run_migrations().await.expect("migrate");

    let state = AppState {
        database: database.clone(),
        fetcher: Arc::new(Fetcher::new(database, source, analyzer, 3)),
        verdict_kind: VerdictKind::Reply,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    let server = tokio::spawn(async move {
        let _ = api::serve(listener, state, std::future::pending()).await;
    });

    TestApp {
        base_url,
        client: reqwest::Client::new(),
        server,
    }
}

async fn spawn_default_app(source: CannedSource) -> TestApp {
    spawn_app(
        Ok(Arc::new(source)),
        Ok(Arc::new(TitleAnalyzer { reply_fails: false })),
    )
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_reports_ok() {
    let app = spawn_default_app(CannedSource::default()).await;
    assert_eq!(app.json("/api/health").await, json!({"status": "ok"}));
    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subreddit_crud() {
    let app = spawn_default_app(CannedSource::default()).await;

    let resp = app
        .client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "r/rust"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["name"], "rust");
    assert_eq!(created["isActive"], true);
    let id = created["id"].as_i64().unwrap();

    let resp = app
        .client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "Rust"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "CONFLICT");

    let resp = app
        .client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "no spaces"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .client
        .patch(app.url(&format!("/api/subreddits/{id}/status")))
        .json(&json!({"isActive": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert_eq!(app.json("/api/subreddits").await[0]["isActive"], false);

    let resp = app
        .client
        .patch(app.url("/api/subreddits/999/status"))
        .json(&json!({"isActive": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .client
        .delete(app.url(&format!("/api/subreddits/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    let resp = app
        .client
        .delete(app.url(&format!("/api/subreddits/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(app.json("/api/subreddits").await, json!([]));

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_ids_use_error_shape() {
    let app = spawn_default_app(CannedSource::default()).await;

    let requests = [
        app.client
            .patch(app.url("/api/posts/abc/status"))
            .json(&json!({"status": "ignored"})),
        app.client.get(app.url("/api/posts?id=abc")),
        app.client.delete(app.url("/api/subreddits/abc")),
        app.client
            .patch(app.url("/api/subreddits/abc/status"))
            .json(&json!({"isActive": true})),
        app.client.post(app.url("/api/posts/abc/regenerate-reply")),
    ];

    for request in requests {
        let resp = request.send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_INPUT");
        assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));
    }

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_status_codes() {
    let source = CannedSource::default().with("foo", &[("t3_a", "8"), ("t3_b", "5")]);
    let app = spawn_default_app(source).await;

    let resp = app.client.post(app.url("/api/fetch")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    app.client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "foo"}))
        .send()
        .await
        .unwrap();
    let resp = app.client.post(app.url("/api/fetch")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let summary: Value = resp.json().await.unwrap();
    assert_eq!(summary["stored"], 1);
    assert_eq!(summary["errors"], json!([]));

    let posts = app.json("/api/posts?status=pending").await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["postId"], "t3_a");
    assert_eq!(posts[0]["score"], 8);
    assert_eq!(posts[0]["analysis"]["suggestedReply"], "Initial reply");

    // An unknown subreddit fails upstream; the run still completes.
    app.client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "missing"}))
        .send()
        .await
        .unwrap();
    let resp = app.client.post(app.url("/api/fetch")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 207);
    let summary: Value = resp.json().await.unwrap();
    assert_eq!(summary["stored"], 0);
    let errors = summary["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("r/missing:"));

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_without_clients_is_server_error() {
    let app = spawn_app(
        Err("REDDIT_CLIENT_ID is not set".to_string()),
        Err("OPENAI_API_KEY is not set".to_string()),
    )
    .await;

    let resp = app.client.post(app.url("/api/fetch")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "NOT_INITIALIZED");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("client not initialized"));

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn post_triage_flow() {
    let source =
        CannedSource::default().with("foo", &[("t3_a", "9"), ("t3_b", "8"), ("t3_c", "7")]);
    let app = spawn_default_app(source).await;

    app.client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "foo"}))
        .send()
        .await
        .unwrap();
    app.client.post(app.url("/api/fetch")).send().await.unwrap();

    let posts = app.json("/api/posts").await;
    let ids: HashMap<String, i64> = posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["postId"].as_str().unwrap().to_string(), p["id"].as_i64().unwrap()))
        .collect();
    assert_eq!(ids.len(), 3);
    let a = ids["t3_a"];
    let b = ids["t3_b"];

    // Status updates are idempotent.
    for _ in 0..2 {
        let resp = app
            .client
            .patch(app.url(&format!("/api/posts/{a}/status")))
            .json(&json!({"status": "replied"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);
    }
    let replied = app.json("/api/posts?status=replied").await;
    assert_eq!(replied.as_array().unwrap().len(), 1);
    assert!(replied[0]["statusChangedAt"].is_string());

    let resp = app
        .client
        .patch(app.url(&format!("/api/posts/{a}/status")))
        .json(&json!({"status": "archived"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let resp = app.client.get(app.url("/api/posts?status=archived")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let resp = app
        .client
        .patch(app.url("/api/posts/999/status"))
        .json(&json!({"status": "ignored"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // Reply editing.
    let resp = app
        .client
        .patch(app.url(&format!("/api/posts/{b}/update-reply")))
        .json(&json!({"suggestedReply": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let edited: Value = app
        .client
        .patch(app.url(&format!("/api/posts/{b}/update-reply")))
        .json(&json!({"suggestedReply": "Hand-written reply"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edited["suggestedReply"], "Hand-written reply");
    assert_eq!(edited["score"], 8);

    let regenerated: Value = app
        .client
        .post(app.url(&format!("/api/posts/{b}/regenerate-reply")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(regenerated["suggestedReply"], "Regenerated reply");
    assert_eq!(regenerated["score"], edited["score"]);
    assert_eq!(regenerated["analysis"], edited["analysis"]);
    assert_eq!(regenerated["status"], "pending");

    let resp = app
        .client
        .post(app.url("/api/posts/999/regenerate-reply"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // Bulk actions only touch pending posts.
    let ignored: Value = app
        .client
        .patch(app.url("/api/posts/ignore-all"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ignored, json!({"updated": 2}));
    let deleted: Value = app
        .client
        .delete(app.url("/api/posts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted, json!({"deleted": 0}));
    assert_eq!(app.json("/api/posts").await.as_array().unwrap().len(), 3);

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn regenerate_reports_analyzer_failures() {
    let source = CannedSource::default().with("foo", &[("t3_a", "9")]);
    let app = spawn_app(
        Ok(Arc::new(source)),
        Ok(Arc::new(TitleAnalyzer { reply_fails: true })),
    )
    .await;

    app.client
        .post(app.url("/api/subreddits"))
        .json(&json!({"name": "foo"}))
        .send()
        .await
        .unwrap();
    app.client.post(app.url("/api/fetch")).send().await.unwrap();
    let id = app.json("/api/posts").await[0]["id"].as_i64().unwrap();

    let resp = app
        .client
        .post(app.url(&format!("/api/posts/{id}/regenerate-reply")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 502);
    assert_eq!(app.json("/api/posts").await[0]["suggestedReply"], "Initial reply");

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn config_roundtrip() {
    let app = spawn_default_app(CannedSource::default()).await;

    let config = app.json("/api/config").await;
    assert_eq!(config["scoreThreshold"], 7);
    assert_eq!(config["postsPerFetch"], 25);
    let prompt = config["openAiPrompt"].as_str().unwrap();
    assert!(prompt.contains("suggestedReply"));

    let mut updated = config.clone();
    updated["scoreThreshold"] = json!(5);
    updated["checkFrequency"] = json!(0.5);
    let resp = app
        .client
        .put(app.url("/api/config"))
        .json(&updated)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    let stored = app.json("/api/config").await;
    assert_eq!(stored["scoreThreshold"], 5);
    assert_eq!(stored["checkFrequency"], 0.5);

    updated["postsPerFetch"] = json!(500);
    let resp = app
        .client
        .put(app.url("/api/config"))
        .json(&updated)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .client
        .put(app.url("/api/config"))
        .json(&json!({"scoreThreshold": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(app.json("/api/config").await["scoreThreshold"], 5);

    app.shutdown().await;
}
