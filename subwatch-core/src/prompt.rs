use crate::error::CoreError;
use crate::types::VerdictKind;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_PROMPT: &str =
    "You are an AI assistant analyzing Reddit content for sentiment about AI technology.";
const DEFAULT_SCORING_CRITERIA: &str =
    "10 indicates high relevance and strong negative sentiment about AI";
const DEFAULT_ANALYSIS_GUIDANCE: &str = "a brief explanation of why you gave this score";
const DEFAULT_REPLY_STYLE: &str =
    "a courteous and factual 1-2 sentence reply that addresses their concerns";

const MIN_PROMPT_LEN: usize = 10;

/// The operator-editable pieces of the analyzer prompt. Stored as separate
/// fields and rendered on demand, so the settings form never has to parse a
/// prompt back into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub base_prompt: String,
    pub scoring_criteria: String,
    pub analysis_guidance: String,
    pub reply_style: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            base_prompt: DEFAULT_BASE_PROMPT.to_string(),
            scoring_criteria: DEFAULT_SCORING_CRITERIA.to_string(),
            analysis_guidance: DEFAULT_ANALYSIS_GUIDANCE.to_string(),
            reply_style: DEFAULT_REPLY_STYLE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("basePrompt", &self.base_prompt),
            ("scoringCriteria", &self.scoring_criteria),
            ("analysisGuidance", &self.analysis_guidance),
            ("replyStyle", &self.reply_style),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(CoreError::InvalidInput {
                    message: format!("{name} must not be empty"),
                });
            }
        }
        if self.base_prompt.trim().len() < MIN_PROMPT_LEN {
            return Err(CoreError::InvalidInput {
                message: format!("basePrompt must be at least {MIN_PROMPT_LEN} characters"),
            });
        }
        Ok(())
    }

    /// Full system prompt for scoring an item.
    pub fn render(&self, kind: VerdictKind) -> String {
        let outcome_line = match kind {
            VerdictKind::Reply => format!("  \"suggestedReply\": {}", self.reply_style.trim()),
            VerdictKind::Sentiment => {
                "  \"sentimentCategory\": string indicating the primary sentiment category"
                    .to_string()
            }
        };

        format!(
            "{}\nPlease analyze the following text and respond with a JSON object containing:\n{{\n  \"score\": number between 1-10 where {},\n  \"analysis\": {},\n{}\n}}",
            self.base_prompt.trim(),
            self.scoring_criteria.trim(),
            self.analysis_guidance.trim(),
            outcome_line
        )
    }

    /// System prompt used when only a fresh reply is wanted.
    pub fn render_reply_only(&self) -> String {
        format!(
            "{}\nWrite a reply to the following text and respond with a JSON object containing:\n{{\n  \"suggestedReply\": {}\n}}",
            self.base_prompt.trim(),
            self.reply_style.trim()
        )
    }
}
