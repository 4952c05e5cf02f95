use std::fmt;

/// Client-side error taxonomy.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Malformed input file: no header row could be derived.
    Parse(String),
    /// Invalid input caught before any network call, e.g. an incomplete
    /// column mapping; carries the offending field labels or messages.
    Validation(Vec<String>),
    /// Operation not allowed in the pipeline's current state.
    State(String),
    /// Expired, invalid, or server-rejected credentials.
    Auth(String),
    /// Non-2xx response, with the server's human-readable detail when present.
    Remote {
        status: u16,
        detail: Option<String>,
    },
    /// No response obtained (connect failure, timeout, body cut short).
    Network(String),
    /// Local token-store persistence failure.
    Io(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<ClientError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ClientError::Validation(missing) => {
                write!(f, "Validation error: {}", missing.join(", "))
            }
            ClientError::State(msg) => write!(f, "Invalid operation: {}", msg),
            ClientError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ClientError::Remote { status, detail } => match detail {
                Some(detail) => write!(f, "Remote service error ({}): {}", status, detail),
                None => write!(f, "Remote service error ({})", status),
            },
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Io(msg) => write!(f, "Storage error: {}", msg),
            ClientError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// True when the error means the session has ended and the caller must
    /// route to re-authentication.
    pub fn is_auth(&self) -> bool {
        match self {
            ClientError::Auth(_) => true,
            ClientError::WithContext { source, .. } => source.is_auth(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    /// Converts a `reqwest::Error` into a `ClientError`.
    ///
    /// Transport-level failures (no response obtained) become `Network`;
    /// a status captured via `error_for_status` becomes `Remote`.
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ClientError::Remote {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `ClientError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, ClientError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, ClientError> {
    fn context(self, context: impl Into<String>) -> Result<T, ClientError> {
        self.map_err(|e| ClientError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ClientError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for std::io::Error so token-store calls can add context directly.
impl<T> ResultExt<T> for Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, ClientError> {
        self.map_err(|e| ClientError::WithContext {
            source: Box::new(ClientError::Io(e.to_string())),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ClientError::WithContext {
            source: Box::new(ClientError::Io(e.to_string())),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_joins_labels() {
        let err = ClientError::Validation(vec!["Postcode".to_string(), "Status".to_string()]);
        assert_eq!(err.to_string(), "Validation error: Postcode, Status");
    }

    #[test]
    fn is_auth_sees_through_context() {
        let err: Result<(), ClientError> = Err(ClientError::Auth("token rejected".to_string()));
        let wrapped = err.context("refreshing profile").unwrap_err();
        assert!(wrapped.is_auth());
        assert!(!ClientError::Network("down".to_string()).is_auth());
    }

    #[test]
    fn io_errors_convert_to_io_variant() {
        let err: ClientError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs").into();
        assert!(matches!(err, ClientError::Io(_)));
        assert!(err.to_string().contains("read-only fs"));
    }

    #[test]
    fn remote_display_includes_detail_when_present() {
        let with = ClientError::Remote {
            status: 422,
            detail: Some("bad year".to_string()),
        };
        let without = ClientError::Remote {
            status: 500,
            detail: None,
        };
        assert_eq!(with.to_string(), "Remote service error (422): bad year");
        assert_eq!(without.to_string(), "Remote service error (500)");
    }
}
