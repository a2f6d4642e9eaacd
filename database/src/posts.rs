use crate::Database;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use subwatch_core::{
    CoreError, DatabaseError, MonitoredPost, NewPost, PostFilter, PostStatus, PostUpdate, Verdict,
};
use tracing::debug;

const POST_COLUMNS: &str = "id, post_id, subreddit, author, title, content, url, timestamp, \
     score, analysis, suggested_reply, status, status_changed_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    post_id: String,
    subreddit: String,
    author: String,
    title: String,
    content: String,
    url: String,
    timestamp: DateTime<Utc>,
    score: i64,
    analysis: String,
    suggested_reply: Option<String>,
    status: String,
    status_changed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PostRow> for MonitoredPost {
    type Error = CoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let corrupt = |details: String| DatabaseError::CorruptRow { details };
        let score = u8::try_from(row.score)
            .map_err(|_| corrupt(format!("post {} has score {}", row.id, row.score)))?;
        let analysis: Verdict = serde_json::from_str(&row.analysis)?;

        Ok(Self {
            id: row.id,
            post_id: row.post_id,
            subreddit: row.subreddit,
            author: row.author,
            title: row.title,
            content: row.content,
            url: row.url,
            timestamp: row.timestamp,
            score,
            analysis,
            suggested_reply: row.suggested_reply,
            status: row.status.parse()?,
            status_changed_at: row.status_changed_at,
        })
    }
}

fn into_posts(rows: Vec<PostRow>) -> Result<Vec<MonitoredPost>, CoreError> {
    rows.into_iter().map(MonitoredPost::try_from).collect()
}

impl Database {
    /// Lists posts newest first, optionally narrowed by status and/or id.
    pub async fn list_posts(&self, filter: PostFilter) -> Result<Vec<MonitoredPost>, CoreError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM monitored_posts WHERE 1 = 1"));
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(id) = filter.id {
            builder.push(" AND id = ").push_bind(id);
        }
        builder.push(" ORDER BY timestamp DESC, id DESC");

        let rows: Vec<PostRow> = builder.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        into_posts(rows)
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<MonitoredPost>, CoreError> {
        let row: Option<PostRow> =
            sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM monitored_posts WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(MonitoredPost::try_from).transpose()
    }

    /// Stores a post. Returns `None` if a post with the same source id is
    /// already stored.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Option<MonitoredPost>, CoreError> {
        let analysis = serde_json::to_string(&post.analysis)?;
        let result = sqlx::query(
            "INSERT INTO monitored_posts \
             (post_id, subreddit, author, title, content, url, timestamp, score, analysis, \
              suggested_reply, status, status_changed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL) \
             ON CONFLICT(post_id) DO NOTHING",
        )
        .bind(&post.post_id)
        .bind(&post.subreddit)
        .bind(&post.author)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.url)
        .bind(post.timestamp)
        .bind(i64::from(post.score))
        .bind(analysis)
        .bind(&post.suggested_reply)
        .bind(post.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(post_id = %post.post_id, "Post already stored, skipping");
            return Ok(None);
        }
        self.get_post(result.last_insert_rowid()).await
    }

    /// Sets a post's status. Repeating the same status is a no-op that still
    /// succeeds; `statusChangedAt` only moves when the status changes.
    /// Returns `false` when the id is unknown.
    pub async fn update_post_status(&self, id: i64, status: PostStatus) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE monitored_posts \
             SET status_changed_at = CASE WHEN status = ? THEN status_changed_at ELSE ? END, \
                 status = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Applies the set fields of `update` to one post and returns the result.
    pub async fn update_post(
        &self,
        id: i64,
        update: PostUpdate,
    ) -> Result<Option<MonitoredPost>, CoreError> {
        let Some(current) = self.get_post(id).await? else {
            return Ok(None);
        };

        let status = update.status.unwrap_or(current.status);
        let status_changed_at = if status != current.status {
            Some(Utc::now())
        } else {
            current.status_changed_at
        };
        let score = update.score.unwrap_or(current.score);
        let analysis =
            serde_json::to_string(update.analysis.as_ref().unwrap_or(&current.analysis))?;
        let suggested_reply = update.suggested_reply.or(current.suggested_reply);

        sqlx::query(
            "UPDATE monitored_posts \
             SET score = ?, analysis = ?, suggested_reply = ?, status = ?, status_changed_at = ? \
             WHERE id = ?",
        )
        .bind(i64::from(score))
        .bind(analysis)
        .bind(suggested_reply)
        .bind(status.as_str())
        .bind(status_changed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_post(id).await
    }

    /// Replaces only the suggested reply.
    pub async fn update_post_reply(
        &self,
        id: i64,
        reply: &str,
    ) -> Result<Option<MonitoredPost>, CoreError> {
        let result = sqlx::query("UPDATE monitored_posts SET suggested_reply = ? WHERE id = ?")
            .bind(reply)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    /// Deletes every pending post. Replied and ignored posts are kept.
    pub async fn delete_pending_posts(&self) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM monitored_posts WHERE status = ?")
            .bind(PostStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Marks every pending post as ignored.
    pub async fn ignore_pending_posts(&self) -> Result<u64, CoreError> {
        let result = sqlx::query(
            "UPDATE monitored_posts SET status = ?, status_changed_at = ? WHERE status = ?",
        )
        .bind(PostStatus::Ignored.as_str())
        .bind(Utc::now())
        .bind(PostStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Every stored source id, used to skip already-seen items.
    pub async fn processed_post_ids(&self) -> Result<HashSet<String>, CoreError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT post_id FROM monitored_posts")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn count_posts(&self, status: PostStatus) -> Result<i64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM monitored_posts WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
