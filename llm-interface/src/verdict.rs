use serde_json::Value;
use subwatch_core::{CoreError, LlmError, Verdict, VerdictKind, VerdictOutcome};

const NO_ANALYSIS: &str = "No analysis provided";
const DEFAULT_CATEGORY: &str = "general";

fn invalid(provider: &str, details: impl Into<String>) -> CoreError {
    CoreError::Llm(LlmError::InvalidResponseFormat {
        provider: provider.to_string(),
        details: details.into(),
    })
}

fn parse_object(
    provider: &str,
    content: &str,
) -> Result<serde_json::Map<String, Value>, CoreError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Llm(LlmError::EmptyResponse {
            provider: provider.to_string(),
        }));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(invalid(provider, "expected a JSON object")),
        Err(e) => Err(invalid(provider, e.to_string())),
    }
}

fn string_field<'a>(
    provider: &str,
    map: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a str, CoreError> {
    map.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(provider, format!("`{field}` must be a string")))
}

/// Parses a model's JSON answer into a [`Verdict`].
///
/// `score` must be a number; it is rounded and clamped into `[1, 10]`.
/// The second text field depends on `kind`.
pub fn parse_verdict(
    provider: &str,
    content: &str,
    kind: VerdictKind,
) -> Result<Verdict, CoreError> {
    let map = parse_object(provider, content)?;

    let raw_score = map
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid(provider, "`score` must be a number"))?;

    let analysis = string_field(provider, &map, "analysis")?.trim();
    let analysis = if analysis.is_empty() {
        NO_ANALYSIS.to_string()
    } else {
        analysis.to_string()
    };

    let outcome = match kind {
        VerdictKind::Reply => {
            let reply = string_field(provider, &map, "suggestedReply")?;
            VerdictOutcome::SuggestedReply(reply.trim().to_string())
        }
        VerdictKind::Sentiment => {
            let category = string_field(provider, &map, "sentimentCategory")?.trim();
            VerdictOutcome::SentimentCategory(if category.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category.to_string()
            })
        }
    };

    Ok(Verdict {
        score: Verdict::clamp_score(raw_score),
        analysis,
        outcome,
    })
}

/// Parses the answer to a reply-only prompt.
pub fn parse_reply(provider: &str, content: &str) -> Result<String, CoreError> {
    let map = parse_object(provider, content)?;
    let reply = string_field(provider, &map, "suggestedReply")?.trim();
    if reply.is_empty() {
        return Err(CoreError::Llm(LlmError::EmptyResponse {
            provider: provider.to_string(),
        }));
    }
    Ok(reply.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_of(raw: &str) -> u8 {
        let content = format!(r#"{{"score": {raw}, "analysis": "a", "suggestedReply": "r"}}"#);
        parse_verdict("test", &content, VerdictKind::Reply)
            .unwrap()
            .score
    }

    #[test]
    fn scores_are_clamped_and_rounded() {
        assert_eq!(score_of("0"), 1);
        assert_eq!(score_of("-4"), 1);
        assert_eq!(score_of("11"), 10);
        assert_eq!(score_of("250"), 10);
        assert_eq!(score_of("6.5"), 7);
        assert_eq!(score_of("6.49"), 6);
        assert_eq!(score_of("8"), 8);
    }

    #[test]
    fn reply_verdict_parses() {
        let verdict = parse_verdict(
            "test",
            r#"{"score": 9, "analysis": "  strongly negative ", "suggestedReply": "Here is some context."}"#,
            VerdictKind::Reply,
        )
        .unwrap();
        assert_eq!(verdict.score, 9);
        assert_eq!(verdict.analysis, "strongly negative");
        assert_eq!(verdict.suggested_reply(), Some("Here is some context."));
    }

    #[test]
    fn sentiment_verdict_defaults_blank_category() {
        let verdict = parse_verdict(
            "test",
            r#"{"score": 3, "analysis": "", "sentimentCategory": ""}"#,
            VerdictKind::Sentiment,
        )
        .unwrap();
        assert_eq!(verdict.analysis, NO_ANALYSIS);
        assert_eq!(verdict.sentiment_category(), Some(DEFAULT_CATEGORY));
    }

    #[test]
    fn malformed_answers_are_errors() {
        let cases = [
            r#"not json"#,
            r#"[1, 2]"#,
            r#"{"score": "8", "analysis": "a", "suggestedReply": "r"}"#,
            r#"{"score": 8, "suggestedReply": "r"}"#,
            r#"{"score": 8, "analysis": "a"}"#,
        ];
        for content in cases {
            let err = parse_verdict("test", content, VerdictKind::Reply).unwrap_err();
            assert!(
                matches!(err, CoreError::Llm(LlmError::InvalidResponseFormat { .. })),
                "{content} gave {err:?}"
            );
        }
    }

    #[test]
    fn empty_answer_is_empty_response() {
        let err = parse_verdict("test", "   ", VerdictKind::Reply).unwrap_err();
        assert!(matches!(err, CoreError::Llm(LlmError::EmptyResponse { .. })));
    }

    #[test]
    fn reply_only_answer() {
        assert_eq!(
            parse_reply("test", r#"{"suggestedReply": " Thanks for sharing. "}"#).unwrap(),
            "Thanks for sharing."
        );
        assert!(parse_reply("test", r#"{"suggestedReply": ""}"#).is_err());
        assert!(parse_reply("test", r#"{"reply": "x"}"#).is_err());
    }
}
