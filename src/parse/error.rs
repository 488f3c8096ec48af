use std::fmt;

/// Errors produced when parsing filter or expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid expression text: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ParseError::new("expected label block");
        assert_eq!(err.to_string(), "invalid expression text: expected label block");
        assert_eq!(err.message(), "expected label block");
    }

    #[test]
    fn filter_from_str_fails_without_label_block() {
        let err = "room".parse::<crate::Filter>().unwrap_err();
        assert!(!err.message().is_empty());
    }
}
