use subwatch_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, LlmError, RedditApiError,
};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::ConstraintViolation {
        constraint: "monitored_posts.post_id".to_string(),
    });
    assert_eq!(db_error.error_code(), "DATABASE");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "OPENAI_API_KEY".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let not_initialized = CoreError::NotInitialized {
        component: "Reddit".to_string(),
        reason: "missing credentials".to_string(),
    };
    assert_eq!(not_initialized.error_code(), "NOT_INITIALIZED");
}

#[test]
fn test_upstream_errors() {
    let reddit = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(reddit.is_upstream());

    let llm = CoreError::Llm(LlmError::EmptyResponse {
        provider: "openai".to_string(),
    });
    assert!(llm.is_upstream());

    let input = CoreError::InvalidInput {
        message: "bad".to_string(),
    };
    assert!(!input.is_upstream());
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "REDDIT_CLIENT_ID".to_string(),
    });
    assert!(config_error
        .user_friendly_message()
        .contains("REDDIT_CLIENT_ID"));

    let parse_error = CoreError::Llm(LlmError::InvalidResponseFormat {
        provider: "openai".to_string(),
        details: "expected value".to_string(),
    });
    assert!(parse_error.user_friendly_message().contains("JSON"));
}

#[test]
fn test_not_initialized_display() {
    let error = CoreError::NotInitialized {
        component: "Reddit".to_string(),
        reason: "Environment variable not set: REDDIT_PASSWORD".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Reddit client not initialized: Environment variable not set: REDDIT_PASSWORD"
    );
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new();
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // Only checks that reporting does not panic.
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
