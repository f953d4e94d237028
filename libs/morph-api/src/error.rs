use std::fmt;

/// Error returned by converters and validators.
///
/// Carries only a message; the engine decides whether the failure aborts the
/// adaptation or drops a single overflow key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError {
    pub message: String,
}

impl ConvertError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }

    /// Add context to the error.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConvertError {}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<serde_json::Error> for ConvertError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<String> for ConvertError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ConvertError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_prefixed() {
        let err = ConvertError::new("not a date").with_context("birth_date");
        assert_eq!(err.to_string(), "birth_date: not a date");
    }

    #[test]
    fn json_errors_convert() {
        let json_err = serde_json::from_str::<i32>("\"x\"").unwrap_err();
        let err: ConvertError = json_err.into();
        assert!(err.message.contains("invalid type"));
    }
}
