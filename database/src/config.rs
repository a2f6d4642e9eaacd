use crate::Database;
use subwatch_core::{CoreError, DatabaseError, MonitorConfig, PromptTemplate};
use tracing::info;

#[derive(sqlx::FromRow)]
struct ConfigRow {
    score_threshold: i64,
    check_frequency: f64,
    posts_per_fetch: i64,
    base_prompt: String,
    scoring_criteria: String,
    analysis_guidance: String,
    reply_style: String,
}

impl TryFrom<ConfigRow> for MonitorConfig {
    type Error = CoreError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        let out_of_range = |field: &str, value: i64| DatabaseError::CorruptRow {
            details: format!("monitor_config.{field} = {value}"),
        };
        Ok(Self {
            score_threshold: u8::try_from(row.score_threshold)
                .map_err(|_| out_of_range("score_threshold", row.score_threshold))?,
            check_frequency: row.check_frequency,
            posts_per_fetch: u32::try_from(row.posts_per_fetch)
                .map_err(|_| out_of_range("posts_per_fetch", row.posts_per_fetch))?,
            prompt_template: PromptTemplate {
                base_prompt: row.base_prompt,
                scoring_criteria: row.scoring_criteria,
                analysis_guidance: row.analysis_guidance,
                reply_style: row.reply_style,
            },
        })
    }
}

impl Database {
    /// Reads the monitor config, storing the defaults on first use.
    pub async fn get_config(&self) -> Result<MonitorConfig, CoreError> {
        let row: Option<ConfigRow> = sqlx::query_as(
            "SELECT score_threshold, check_frequency, posts_per_fetch, base_prompt, \
             scoring_criteria, analysis_guidance, reply_style \
             FROM monitor_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let config = MonitorConfig::default();
                info!("No monitor config stored, writing defaults");
                self.save_config(&config).await?;
                Ok(config)
            }
        }
    }

    /// Replaces the stored config wholesale after validating it.
    pub async fn save_config(&self, config: &MonitorConfig) -> Result<(), CoreError> {
        config.validate()?;
        let template = &config.prompt_template;

        sqlx::query(
            "INSERT INTO monitor_config \
             (id, score_threshold, check_frequency, posts_per_fetch, base_prompt, \
              scoring_criteria, analysis_guidance, reply_style) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               score_threshold = excluded.score_threshold, \
               check_frequency = excluded.check_frequency, \
               posts_per_fetch = excluded.posts_per_fetch, \
               base_prompt = excluded.base_prompt, \
               scoring_criteria = excluded.scoring_criteria, \
               analysis_guidance = excluded.analysis_guidance, \
               reply_style = excluded.reply_style",
        )
        .bind(i64::from(config.score_threshold))
        .bind(config.check_frequency)
        .bind(i64::from(config.posts_per_fetch))
        .bind(&template.base_prompt)
        .bind(&template.scoring_criteria)
        .bind(&template.analysis_guidance)
        .bind(&template.reply_style)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
