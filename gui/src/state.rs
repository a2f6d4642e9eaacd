use std::fmt;
use subwatch_core::{MonitorConfig, MonitoredPost, PostStatus, PromptTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    HighestScore,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [SortOrder::Newest, SortOrder::Oldest, SortOrder::HighestScore];
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortOrder::Newest => "Newest first",
            SortOrder::Oldest => "Oldest first",
            SortOrder::HighestScore => "Highest score",
        };
        f.write_str(label)
    }
}

/// Dashboard list filters.
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub tab: PostStatus,
    pub sort: SortOrder,
    /// Case-insensitive substring of the subreddit name.
    pub subreddit: String,
    pub min_score: u8,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            tab: PostStatus::Pending,
            sort: SortOrder::default(),
            subreddit: String::new(),
            min_score: 1,
        }
    }
}

impl PostQuery {
    pub fn apply<'a>(&self, posts: &'a [MonitoredPost]) -> Vec<&'a MonitoredPost> {
        let needle = self.subreddit.trim().to_lowercase();
        let mut visible: Vec<&MonitoredPost> = posts
            .iter()
            .filter(|p| p.status == self.tab)
            .filter(|p| p.score >= self.min_score)
            .filter(|p| needle.is_empty() || p.subreddit.to_lowercase().contains(&needle))
            .collect();

        match self.sort {
            SortOrder::Newest => visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            SortOrder::Oldest => visible.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            SortOrder::HighestScore => visible.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| b.timestamp.cmp(&a.timestamp))
            }),
        }
        visible
    }
}

/// Number of posts per status, ignoring the other filters.
pub fn status_count(posts: &[MonitoredPost], status: PostStatus) -> usize {
    posts.iter().filter(|p| p.status == status).count()
}

/// Source line of a review card. Sentiment verdicts show their category.
pub fn post_byline(post: &MonitoredPost) -> String {
    let byline = format!("r/{} · u/{} · score {}/10", post.subreddit, post.author, post.score);
    match post.analysis.sentiment_category() {
        Some(category) => format!("{byline} · {category}"),
        None => byline,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ScoreThreshold,
    CheckFrequency,
    PostsPerFetch,
    BasePrompt,
    ScoringCriteria,
    AnalysisGuidance,
    ReplyStyle,
}

/// Editable copy of the monitor config. Numbers stay as text until saved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsForm {
    pub score_threshold: String,
    pub check_frequency: String,
    pub posts_per_fetch: String,
    pub base_prompt: String,
    pub scoring_criteria: String,
    pub analysis_guidance: String,
    pub reply_style: String,
}

impl SettingsForm {
    pub fn from_config(config: &MonitorConfig) -> Self {
        let template = &config.prompt_template;
        Self {
            score_threshold: config.score_threshold.to_string(),
            check_frequency: config.check_frequency.to_string(),
            posts_per_fetch: config.posts_per_fetch.to_string(),
            base_prompt: template.base_prompt.clone(),
            scoring_criteria: template.scoring_criteria.clone(),
            analysis_guidance: template.analysis_guidance.clone(),
            reply_style: template.reply_style.clone(),
        }
    }

    pub fn set(&mut self, field: SettingsField, value: String) {
        let slot = match field {
            SettingsField::ScoreThreshold => &mut self.score_threshold,
            SettingsField::CheckFrequency => &mut self.check_frequency,
            SettingsField::PostsPerFetch => &mut self.posts_per_fetch,
            SettingsField::BasePrompt => &mut self.base_prompt,
            SettingsField::ScoringCriteria => &mut self.scoring_criteria,
            SettingsField::AnalysisGuidance => &mut self.analysis_guidance,
            SettingsField::ReplyStyle => &mut self.reply_style,
        };
        *slot = value;
    }

    /// Parses and validates the form, returning a message fit for display.
    pub fn to_config(&self) -> Result<MonitorConfig, String> {
        let config = MonitorConfig {
            score_threshold: parse_field("Score threshold", &self.score_threshold)?,
            check_frequency: parse_field("Check frequency", &self.check_frequency)?,
            posts_per_fetch: parse_field("Posts per fetch", &self.posts_per_fetch)?,
            prompt_template: PromptTemplate {
                base_prompt: self.base_prompt.clone(),
                scoring_criteria: self.scoring_criteria.clone(),
                analysis_guidance: self.analysis_guidance.clone(),
                reply_style: self.reply_style.clone(),
            },
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn parse_field<T: std::str::FromStr>(label: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{label} must be a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use subwatch_core::{Verdict, VerdictOutcome};

    fn post(
        id: i64,
        subreddit: &str,
        score: u8,
        status: PostStatus,
        age_hours: i64,
    ) -> MonitoredPost {
        MonitoredPost {
            id,
            post_id: format!("t3_{id}"),
            subreddit: subreddit.to_string(),
            author: "author".to_string(),
            title: format!("Post {id}"),
            content: String::new(),
            url: String::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
                - Duration::hours(age_hours),
            score,
            analysis: Verdict {
                score,
                analysis: String::new(),
                outcome: VerdictOutcome::SuggestedReply(String::new()),
            },
            suggested_reply: None,
            status,
            status_changed_at: None,
        }
    }

    fn sample() -> Vec<MonitoredPost> {
        vec![
            post(1, "rust", 7, PostStatus::Pending, 3),
            post(2, "RustJobs", 9, PostStatus::Pending, 1),
            post(3, "golang", 8, PostStatus::Pending, 2),
            post(4, "rust", 10, PostStatus::Replied, 0),
        ]
    }

    fn ids(posts: Vec<&MonitoredPost>) -> Vec<i64> {
        posts.into_iter().map(|p| p.id).collect()
    }

    #[test]
    fn tab_and_sort_order() {
        let posts = sample();
        let mut query = PostQuery::default();
        assert_eq!(ids(query.apply(&posts)), vec![2, 3, 1]);

        query.sort = SortOrder::Oldest;
        assert_eq!(ids(query.apply(&posts)), vec![1, 3, 2]);

        query.sort = SortOrder::HighestScore;
        assert_eq!(ids(query.apply(&posts)), vec![2, 3, 1]);

        query.tab = PostStatus::Replied;
        assert_eq!(ids(query.apply(&posts)), vec![4]);
    }

    #[test]
    fn subreddit_and_score_filters() {
        let posts = sample();
        let query = PostQuery {
            subreddit: " rust ".to_string(),
            ..PostQuery::default()
        };
        assert_eq!(ids(query.apply(&posts)), vec![2, 1]);

        let query = PostQuery {
            min_score: 8,
            ..PostQuery::default()
        };
        assert_eq!(ids(query.apply(&posts)), vec![2, 3]);
    }

    #[test]
    fn counts_per_status() {
        let posts = sample();
        assert_eq!(status_count(&posts, PostStatus::Pending), 3);
        assert_eq!(status_count(&posts, PostStatus::Replied), 1);
        assert_eq!(status_count(&posts, PostStatus::Ignored), 0);
    }

    #[test]
    fn byline_shows_sentiment_category() {
        let mut item = post(5, "rust", 8, PostStatus::Pending, 0);
        assert_eq!(post_byline(&item), "r/rust · u/author · score 8/10");

        item.analysis.outcome = VerdictOutcome::SentimentCategory("frustrated".to_string());
        assert_eq!(post_byline(&item), "r/rust · u/author · score 8/10 · frustrated");
    }

    #[test]
    fn settings_form_round_trips_config() {
        let config = MonitorConfig::default();
        let form = SettingsForm::from_config(&config);
        assert_eq!(form.to_config().unwrap(), config);
    }

    #[test]
    fn settings_form_reports_bad_input() {
        let mut form = SettingsForm::from_config(&MonitorConfig::default());
        form.set(SettingsField::CheckFrequency, "often".to_string());
        assert_eq!(form.to_config().unwrap_err(), "Check frequency must be a number");

        form.set(SettingsField::CheckFrequency, "24".to_string());
        assert!(form.to_config().unwrap_err().contains("checkFrequency"));

        form.set(SettingsField::CheckFrequency, "0.5".to_string());
        form.set(SettingsField::ScoreThreshold, " 4 ".to_string());
        assert_eq!(form.to_config().unwrap().score_threshold, 4);
    }
}
