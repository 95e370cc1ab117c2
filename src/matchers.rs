//! Error predicates for tests
//!
//! Answers "is this an error, optionally with an exact message or one
//! matching a pattern" for any `Result` whose error implements `Display`.

use std::fmt::{self, Debug, Display};

use regex::Regex;

use crate::{BenchError, Result};

/// Expected error message
#[derive(Debug, Clone)]
pub enum MessageMatch {
    /// Any error satisfies the match
    Any,
    /// The rendered message must equal this string
    Exact(String),
    /// The rendered message must match this pattern
    Pattern(Regex),
}

impl MessageMatch {
    pub fn exact(message: impl Into<String>) -> Self {
        MessageMatch::Exact(message.into())
    }

    /// Compile `pattern` into a message matcher
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(MessageMatch::Pattern)
            .map_err(|e| BenchError::Config(format!("invalid message pattern '{}': {}", pattern, e)))
    }

    /// Whether `message` satisfies this matcher
    pub fn matches(&self, message: &str) -> bool {
        match self {
            MessageMatch::Any => true,
            MessageMatch::Exact(expected) => message == expected,
            MessageMatch::Pattern(regex) => regex.is_match(message),
        }
    }
}

impl Display for MessageMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageMatch::Any => write!(f, "an error"),
            MessageMatch::Exact(expected) => write!(f, "an error with message {:?}", expected),
            MessageMatch::Pattern(regex) => {
                write!(f, "an error with message matching /{}/", regex.as_str())
            }
        }
    }
}

/// Whether `value` is an error whose message satisfies `expected`
pub fn is_error_matching<T, E: Display>(
    value: &std::result::Result<T, E>,
    expected: &MessageMatch,
) -> bool {
    match value {
        Ok(_) => false,
        Err(err) => expected.matches(&err.to_string()),
    }
}

/// Check `value` against `expected`, describing the mismatch on failure
pub fn expect_error<T: Debug, E: Display + Debug>(
    value: &std::result::Result<T, E>,
    expected: &MessageMatch,
) -> std::result::Result<(), String> {
    if is_error_matching(value, expected) {
        Ok(())
    } else {
        Err(format!("Expected {:?} to be {}", value, expected))
    }
}

/// Check that `value` is not an error
pub fn expect_not_error<T: Debug, E: Debug>(
    value: &std::result::Result<T, E>,
) -> std::result::Result<(), String> {
    match value {
        Ok(_) => Ok(()),
        Err(_) => Err(format!("Expected {:?} not to be an error", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;

    fn failed() -> std::result::Result<(), BenchError> {
        Err(BenchError::operation(
            "abc1",
            ClientError::new("CacheServerException", "region not found"),
        ))
    }

    #[test]
    fn test_any_matches_every_error() {
        assert!(is_error_matching(&failed(), &MessageMatch::Any));
        assert!(!is_error_matching(
            &Ok::<(), BenchError>(()),
            &MessageMatch::Any
        ));
    }

    #[test]
    fn test_exact_message() {
        let expected = MessageMatch::exact(
            "Operation on key 'abc1' failed: CacheServerException: region not found",
        );
        assert!(is_error_matching(&failed(), &expected));
        assert!(!is_error_matching(
            &failed(),
            &MessageMatch::exact("region not found")
        ));
    }

    #[test]
    fn test_pattern_message() {
        let expected = MessageMatch::pattern(r"region not \w+$").unwrap();
        assert!(is_error_matching(&failed(), &expected));
        assert!(!is_error_matching(
            &failed(),
            &MessageMatch::pattern("^timed out").unwrap()
        ));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(matches!(
            MessageMatch::pattern("(unclosed"),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_failure_descriptions() {
        let ok: std::result::Result<u32, BenchError> = Ok(7);
        let message = expect_error(&ok, &MessageMatch::pattern("boom").unwrap()).unwrap_err();
        assert_eq!(message, "Expected Ok(7) to be an error with message matching /boom/");

        assert!(expect_not_error(&ok).is_ok());
        assert!(expect_not_error(&failed())
            .unwrap_err()
            .ends_with("not to be an error"));
    }
}
