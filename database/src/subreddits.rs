use crate::Database;
use subwatch_core::{CoreError, DatabaseError, MonitoredSubreddit};

#[derive(sqlx::FromRow)]
struct SubredditRow {
    id: i64,
    name: String,
    is_active: bool,
}

impl From<SubredditRow> for MonitoredSubreddit {
    fn from(row: SubredditRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

impl Database {
    pub async fn list_subreddits(&self) -> Result<Vec<MonitoredSubreddit>, CoreError> {
        let rows: Vec<SubredditRow> =
            sqlx::query_as("SELECT id, name, is_active FROM monitored_subreddits ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_active_subreddits(&self) -> Result<Vec<MonitoredSubreddit>, CoreError> {
        let rows: Vec<SubredditRow> = sqlx::query_as(
            "SELECT id, name, is_active FROM monitored_subreddits WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Adds a subreddit after normalizing its name. A name that is already
    /// monitored (case-insensitively) is a conflict.
    pub async fn add_subreddit(
        &self,
        name: &str,
        is_active: bool,
    ) -> Result<MonitoredSubreddit, CoreError> {
        let name = MonitoredSubreddit::normalize_name(name)?;

        let result = sqlx::query("INSERT INTO monitored_subreddits (name, is_active) VALUES (?, ?)")
            .bind(&name)
            .bind(is_active)
            .execute(&self.pool)
            .await
            .map_err(CoreError::from)
            .map_err(|e| match e {
                CoreError::Database(DatabaseError::ConstraintViolation { .. }) => {
                    CoreError::Conflict {
                        message: format!("r/{name} is already monitored"),
                    }
                }
                other => other,
            })?;

        Ok(MonitoredSubreddit {
            id: result.last_insert_rowid(),
            name,
            is_active,
        })
    }

    /// Returns `false` when no subreddit has this id.
    pub async fn remove_subreddit(&self, id: i64) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM monitored_subreddits WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_subreddit_active(&self, id: i64, is_active: bool) -> Result<bool, CoreError> {
        let result = sqlx::query("UPDATE monitored_subreddits SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
