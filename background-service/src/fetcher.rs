use database::Database;
use futures::future::join_all;
use llm_interface::LlmProvider;
use reddit_client::ContentSource;
use std::collections::HashSet;
use std::sync::Arc;
use subwatch_core::{
    ContentItem, CoreError, ErrorExt, FetchSummary, MonitorConfig, MonitoredSubreddit, NewPost,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Runs the fetch, dedup, analyze and store pipeline over every active
/// subreddit.
pub struct Fetcher {
    database: Database,
    source: Result<Arc<dyn ContentSource>, String>,
    analyzer: Result<Arc<dyn LlmProvider>, String>,
    batch_size: usize,
    run_lock: Mutex<()>,
}

impl Fetcher {
    /// `source` and `analyzer` carry the reason they could not be built, so
    /// runs can report it instead of failing at startup.
    pub fn new(
        database: Database,
        source: Result<Arc<dyn ContentSource>, String>,
        analyzer: Result<Arc<dyn LlmProvider>, String>,
        batch_size: usize,
    ) -> Self {
        Self {
            database,
            source,
            analyzer,
            batch_size: batch_size.max(1),
            run_lock: Mutex::new(()),
        }
    }

    pub fn analyzer(&self) -> Result<&Arc<dyn LlmProvider>, CoreError> {
        self.analyzer.as_ref().map_err(|reason| CoreError::NotInitialized {
            component: "OpenAI".to_string(),
            reason: reason.clone(),
        })
    }

    fn source(&self) -> Result<&Arc<dyn ContentSource>, CoreError> {
        self.source.as_ref().map_err(|reason| CoreError::NotInitialized {
            component: "Reddit".to_string(),
            reason: reason.clone(),
        })
    }

    /// Performs one full run. Per-subreddit and per-item failures are
    /// collected in the summary; only setup and store failures abort.
    pub async fn run(&self) -> Result<FetchSummary, CoreError> {
        let source = self.source()?;
        let analyzer = self.analyzer()?;

        let _guard = self.run_lock.lock().await;

        let config = self.database.get_config().await?;
        let subreddits = self.database.list_active_subreddits().await?;
        if subreddits.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "No active subreddits configured".to_string(),
            });
        }

        let prompt = config
            .prompt_template
            .render(analyzer.verdict_kind());
        let mut summary = FetchSummary {
            subreddits: subreddits.len(),
            ..FetchSummary::default()
        };

        info!(
            subreddits = subreddits.len(),
            threshold = config.score_threshold,
            "Starting fetch run"
        );

        for batch in subreddits.chunks(self.batch_size) {
            // Read once per batch: items stored by this batch are not seen
            // by its other members.
            let seen = self.database.processed_post_ids().await?;
            let runs = batch.iter().map(|subreddit| {
                self.process_subreddit(
                    &**source,
                    &**analyzer,
                    subreddit,
                    &config,
                    &prompt,
                    &seen,
                )
            });
            for result in join_all(runs).await {
                summary.merge(result);
            }
        }

        info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            analyzed = summary.analyzed,
            stored = summary.stored,
            errors = summary.errors.len(),
            "Fetch run finished"
        );
        Ok(summary)
    }

    async fn process_subreddit(
        &self,
        source: &dyn ContentSource,
        analyzer: &dyn LlmProvider,
        subreddit: &MonitoredSubreddit,
        config: &MonitorConfig,
        prompt: &str,
        seen: &HashSet<String>,
    ) -> FetchSummary {
        let name = subreddit.name.as_str();
        let mut summary = FetchSummary::default();
        let mut items: Vec<ContentItem> = Vec::new();

        match source.fetch_new_posts(name, config.posts_per_fetch).await {
            Ok(posts) => items.extend(posts),
            Err(e) => summary.errors.push(listing_error(name, "posts", &e)),
        }
        match source.fetch_new_comments(name, config.posts_per_fetch).await {
            Ok(comments) => items.extend(comments),
            Err(e) => summary.errors.push(listing_error(name, "comments", &e)),
        }
        summary.fetched = items.len();

        let mut queued = HashSet::new();
        for item in items {
            if seen.contains(&item.post_id) || !queued.insert(item.post_id.clone()) {
                summary.skipped += 1;
                continue;
            }

            let verdict = match analyzer.analyze(&item.analysis_text(), prompt).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    e.log_warn();
                    summary
                        .errors
                        .push(format!("r/{} item {}: {}", name, item.post_id, e));
                    continue;
                }
            };
            summary.analyzed += 1;

            if verdict.score < config.score_threshold {
                debug!(post_id = %item.post_id, score = verdict.score, "Below threshold");
                continue;
            }

            let post_id = item.post_id.clone();
            match self
                .database
                .insert_post(&NewPost::from_verdict(item, verdict))
                .await
            {
                Ok(Some(_)) => summary.stored += 1,
                Ok(None) => debug!(%post_id, "Stored concurrently by another subreddit"),
                Err(e) => {
                    e.log_error();
                    summary
                        .errors
                        .push(format!("r/{} item {}: {}", name, post_id, e));
                }
            }
        }

        summary
    }
}

fn listing_error(subreddit: &str, listing: &str, error: &CoreError) -> String {
    warn!(subreddit, listing, error = %error, "Failed to fetch listing");
    format!("r/{subreddit}: failed to fetch {listing}: {error}")
}
