use crate::error::*;
use tracing::{error, info, warn};

/// Classification and logging helpers shared by every error type.
pub trait ErrorExt: std::error::Error {
    /// Stable machine-readable code, e.g. `REDDIT_RATE_LIMIT`.
    fn error_code(&self) -> &'static str;

    /// Message safe to show an operator.
    fn user_friendly_message(&self) -> String;

    /// True when the failure came from Reddit or the analyzer rather than
    /// from this process or the caller's input.
    fn is_upstream(&self) -> bool {
        false
    }

    fn log_error(&self) -> &Self
    where
        Self: Sized,
    {
        error!(code = self.error_code(), error = %self, "operation failed");
        self
    }

    fn log_warn(&self) -> &Self
    where
        Self: Sized,
    {
        warn!(code = self.error_code(), error = %self, "operation degraded");
        self
    }
}

impl ErrorExt for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API",
            CoreError::Database(_) => "DATABASE",
            CoreError::Llm(_) => "LLM",
            CoreError::Config(_) => "CONFIG",
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Conflict { .. } => "CONFLICT",
            CoreError::NotInitialized { .. } => "NOT_INITIALIZED",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => "Could not reach an external service.".to_string(),
            CoreError::InvalidInput { message } | CoreError::Conflict { message } => {
                message.clone()
            }
            CoreError::NotFound { resource } => format!("{resource} does not exist."),
            CoreError::NotInitialized { component, .. } => {
                format!("The {component} client is not configured. Set its credentials and restart.")
            }
            CoreError::Io(_) | CoreError::Serialization(_) | CoreError::Internal { .. } => {
                "Something went wrong on the server.".to_string()
            }
        }
    }

    fn is_upstream(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_upstream(),
            CoreError::Llm(e) => e.is_upstream(),
            CoreError::Network(_) => true,
            _ => false,
        }
    }

    fn log_error(&self) -> &Self {
        match self {
            CoreError::RedditApi(e) => {
                e.log_error();
            }
            CoreError::Database(e) => {
                e.log_error();
            }
            CoreError::Llm(e) => {
                e.log_error();
            }
            CoreError::Config(e) => {
                e.log_error();
            }
            other => {
                error!(code = other.error_code(), error = %other, "operation failed");
            }
        }
        self
    }
}

impl ErrorExt for RedditApiError {
    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND",
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit rejected the configured credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => {
                format!("Reddit is rate limiting requests. Try again in {retry_after}s.")
            }
            RedditApiError::Forbidden { resource } => {
                format!("Reddit denied access to {resource}.")
            }
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("r/{subreddit} does not exist or is private.")
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid and will be renewed.".to_string()
            }
            RedditApiError::RequestTimeout => "Reddit did not answer in time.".to_string(),
            RedditApiError::InvalidResponse { .. } | RedditApiError::ServerError { .. } => {
                "Reddit returned an unusable response.".to_string()
            }
        }
    }

    fn is_upstream(&self) -> bool {
        true
    }
}

impl ErrorExt for DatabaseError {
    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED",
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED",
            DatabaseError::ConstraintViolation { .. } => "DB_CONSTRAINT_VIOLATION",
            DatabaseError::CorruptRow { .. } => "DB_CORRUPT_ROW",
            DatabaseError::Sql(_) => "DB_SQL_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConstraintViolation { .. } => "That record already exists.".to_string(),
            DatabaseError::CorruptRow { .. } => "A stored record could not be read.".to_string(),
            _ => "The post store is unavailable.".to_string(),
        }
    }
}

impl ErrorExt for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            LlmError::InvalidApiKey { .. } => "LLM_INVALID_API_KEY",
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMIT",
            LlmError::ModelNotAvailable { .. } => "LLM_MODEL_NOT_AVAILABLE",
            LlmError::ServiceUnavailable { .. } => "LLM_SERVICE_UNAVAILABLE",
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT",
            LlmError::RequestFailed { .. } => "LLM_REQUEST_FAILED",
            LlmError::EmptyResponse { .. } => "LLM_EMPTY_RESPONSE",
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::InvalidApiKey { provider } => format!("The {provider} API key was rejected."),
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!("{provider} is rate limiting requests. Try again in {retry_after}s."),
            LlmError::ModelNotAvailable { model } => {
                format!("Model {model} is not available to this API key.")
            }
            LlmError::EmptyResponse { provider } => format!("{provider} returned no content."),
            LlmError::InvalidResponseFormat { .. } => {
                "The analyzer did not return the expected JSON object.".to_string()
            }
            LlmError::ServiceUnavailable { provider }
            | LlmError::RequestTimeout { provider }
            | LlmError::RequestFailed { provider, .. } => {
                format!("{provider} is unavailable right now.")
            }
        }
    }

    fn is_upstream(&self) -> bool {
        true
    }
}

impl ErrorExt for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => format!("Settings file {path} does not exist."),
            ConfigError::InvalidValue { field, value } => {
                format!("Setting {field} has an invalid value: {value}")
            }
            ConfigError::MissingEnvironmentVariable { var_name } => {
                format!("Set the {var_name} environment variable.")
            }
            ConfigError::Parse(e) => format!("Settings file is not valid TOML: {e}"),
        }
    }
}

/// Logs errors raised where nobody is waiting on a response, such as the
/// scheduled fetch loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!(
            code = error.error_code(),
            message = %error.user_friendly_message(),
            "Reported background error"
        );
    }

    /// For failures outside our control that the next run may not repeat.
    pub fn report_warning(&self, error: &CoreError) {
        error.log_warn();
    }
}
