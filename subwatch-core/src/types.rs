use crate::error::CoreError;
use crate::prompt::PromptTemplate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a normalized item came from a submission or a comment listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
}

/// A post or comment pulled from a subreddit, reduced to the fields the
/// monitor cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Reddit fullname (`t3_…` / `t1_…`), unique across both kinds.
    pub post_id: String,
    pub subreddit: String,
    pub author: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ContentKind,
}

impl ContentItem {
    /// Text handed to the analyzer.
    pub fn analysis_text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredSubreddit {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

impl MonitoredSubreddit {
    /// Strips whitespace and any `r/` prefix, then checks the remaining name
    /// only uses characters Reddit allows in subreddit names.
    pub fn normalize_name(raw: &str) -> Result<String, CoreError> {
        let trimmed = raw.trim();
        let name = trimmed
            .strip_prefix("/r/")
            .or_else(|| trimmed.strip_prefix("r/"))
            .unwrap_or(trimmed)
            .trim_end_matches('/');

        if name.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "Subreddit name must not be empty".to_string(),
            });
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CoreError::InvalidInput {
                message: format!("Invalid subreddit name: {name}"),
            });
        }
        Ok(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Pending,
    Replied,
    Ignored,
}

impl PostStatus {
    pub const ALL: [PostStatus; 3] =
        [PostStatus::Pending, PostStatus::Replied, PostStatus::Ignored];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Replied => "replied",
            PostStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "replied" => Ok(PostStatus::Replied),
            "ignored" => Ok(PostStatus::Ignored),
            other => Err(CoreError::InvalidInput {
                message: format!("Unknown post status: {other}"),
            }),
        }
    }
}

/// Which kind of output the analyzer is asked to produce alongside the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    #[default]
    Reply,
    Sentiment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerdictOutcome {
    SuggestedReply(String),
    SentimentCategory(String),
}

/// Structured analyzer output. Serializes flat, e.g.
/// `{"score": 8, "analysis": "...", "suggestedReply": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub score: u8,
    pub analysis: String,
    #[serde(flatten)]
    pub outcome: VerdictOutcome,
}

impl Verdict {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 10;

    pub fn suggested_reply(&self) -> Option<&str> {
        match &self.outcome {
            VerdictOutcome::SuggestedReply(reply) => Some(reply),
            VerdictOutcome::SentimentCategory(_) => None,
        }
    }

    pub fn sentiment_category(&self) -> Option<&str> {
        match &self.outcome {
            VerdictOutcome::SentimentCategory(category) => Some(category),
            VerdictOutcome::SuggestedReply(_) => None,
        }
    }

    /// Rounds a raw model score and clamps it into `[1, 10]`.
    pub fn clamp_score(raw: f64) -> u8 {
        if raw.is_nan() {
            return Self::MIN_SCORE;
        }
        raw.round()
            .clamp(Self::MIN_SCORE as f64, Self::MAX_SCORE as f64) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredPost {
    pub id: i64,
    pub post_id: String,
    pub subreddit: String,
    pub author: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub score: u8,
    pub analysis: Verdict,
    pub suggested_reply: Option<String>,
    pub status: PostStatus,
    pub status_changed_at: Option<DateTime<Utc>>,
}

/// A post about to be stored by the fetch orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub post_id: String,
    pub subreddit: String,
    pub author: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub score: u8,
    pub analysis: Verdict,
    pub suggested_reply: Option<String>,
    pub status: PostStatus,
}

impl NewPost {
    pub fn from_verdict(item: ContentItem, verdict: Verdict) -> Self {
        let suggested_reply = verdict.suggested_reply().map(str::to_string);
        Self {
            post_id: item.post_id,
            subreddit: item.subreddit,
            author: item.author,
            title: item.title,
            content: item.content,
            url: item.url,
            timestamp: item.timestamp,
            score: verdict.score,
            analysis: verdict,
            suggested_reply,
            status: PostStatus::Pending,
        }
    }
}

/// Partial update of a stored post; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostUpdate {
    pub score: Option<u8>,
    pub analysis: Option<Verdict>,
    pub suggested_reply: Option<String>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub id: Option<i64>,
}

impl PostFilter {
    pub fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            id: None,
        }
    }
}

/// Operator-tunable monitor settings, persisted as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub score_threshold: u8,
    /// Hours between scheduled fetch runs.
    pub check_frequency: f64,
    pub posts_per_fetch: u32,
    pub prompt_template: PromptTemplate,
}

impl MonitorConfig {
    pub const THRESHOLD_RANGE: (u8, u8) = (1, 10);
    pub const FREQUENCY_RANGE: (f64, f64) = (0.5, 12.0);
    pub const POSTS_PER_FETCH_RANGE: (u32, u32) = (5, 100);

    pub fn validate(&self) -> Result<(), CoreError> {
        let (min, max) = Self::THRESHOLD_RANGE;
        if !(min..=max).contains(&self.score_threshold) {
            return Err(invalid_field("scoreThreshold", min, max));
        }
        let (min, max) = Self::FREQUENCY_RANGE;
        if !self.check_frequency.is_finite() || !(min..=max).contains(&self.check_frequency) {
            return Err(invalid_field("checkFrequency", min, max));
        }
        let (min, max) = Self::POSTS_PER_FETCH_RANGE;
        if !(min..=max).contains(&self.posts_per_fetch) {
            return Err(invalid_field("postsPerFetch", min, max));
        }
        self.prompt_template.validate()
    }
}

fn invalid_field<T: fmt::Display>(field: &str, min: T, max: T) -> CoreError {
    CoreError::InvalidInput {
        message: format!("{field} must be between {min} and {max}"),
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 7,
            check_frequency: 1.0,
            posts_per_fetch: 25,
            prompt_template: PromptTemplate::default(),
        }
    }
}

/// Outcome of one fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSummary {
    pub subreddits: usize,
    pub fetched: usize,
    /// Items dropped because their id was already stored.
    pub skipped: usize,
    pub analyzed: usize,
    pub stored: usize,
    pub errors: Vec<String>,
}

impl FetchSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn merge(&mut self, other: FetchSummary) {
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.analyzed += other.analyzed;
        self.stored += other.stored;
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_prefixes() {
        assert_eq!(MonitoredSubreddit::normalize_name(" r/rust ").unwrap(), "rust");
        assert_eq!(MonitoredSubreddit::normalize_name("/r/ALS/").unwrap(), "ALS");
        assert_eq!(
            MonitoredSubreddit::normalize_name("ask_science").unwrap(),
            "ask_science"
        );
        assert!(MonitoredSubreddit::normalize_name("r/").is_err());
        assert!(MonitoredSubreddit::normalize_name("bad name").is_err());
    }

    #[test]
    fn clamp_score_handles_out_of_range_and_fractions() {
        assert_eq!(Verdict::clamp_score(0.0), 1);
        assert_eq!(Verdict::clamp_score(-3.0), 1);
        assert_eq!(Verdict::clamp_score(15.0), 10);
        assert_eq!(Verdict::clamp_score(7.5), 8);
        assert_eq!(Verdict::clamp_score(7.4), 7);
        assert_eq!(Verdict::clamp_score(f64::NAN), 1);
    }

    #[test]
    fn verdict_serializes_flat() {
        let verdict = Verdict {
            score: 8,
            analysis: "relevant".to_string(),
            outcome: VerdictOutcome::SuggestedReply("thanks".to_string()),
        };
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(value["suggestedReply"], "thanks");
        assert_eq!(value["score"], 8);

        let back: Verdict = serde_json::from_value(value).unwrap();
        assert_eq!(back, verdict);

        let sentiment: Verdict = serde_json::from_str(
            r#"{"score":3,"analysis":"meh","sentimentCategory":"support_needs"}"#,
        )
        .unwrap();
        assert_eq!(sentiment.sentiment_category(), Some("support_needs"));
        assert_eq!(sentiment.suggested_reply(), None);
    }

    #[test]
    fn post_status_parses_known_values_only() {
        for status in PostStatus::ALL {
            assert_eq!(status.as_str().parse::<PostStatus>().unwrap(), status);
        }
        assert!("archived".parse::<PostStatus>().is_err());
    }

    #[test]
    fn config_validation_ranges() {
        let mut config = MonitorConfig::default();
        assert!(config.validate().is_ok());

        config.score_threshold = 11;
        assert!(config.validate().is_err());

        config = MonitorConfig {
            check_frequency: 0.25,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());

        config = MonitorConfig {
            posts_per_fetch: 101,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
