use serde::Serialize;
use std::fmt::Display;

/// Failure classes. The first five are the remote taxonomy every API failure
/// is mapped into; `Usage` and `Io` cover local problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    #[serde(rename = "rate_limit")]
    RateLimited,
    MissingPermissions,
    Unreachable,
    Generic,
    Usage,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limit",
            Self::MissingPermissions => "missing_permissions",
            Self::Unreachable => "unreachable",
            Self::Generic => "generic",
            Self::Usage => "usage",
            Self::Io => "io",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Auth = 3,
    Remote = 4,
    RateLimited = 5,
    Io = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct SatchelError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status of the failed response; absent for network failures and
    /// local errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    /// Seconds until the rate-limit window resets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_delay: Option<u64>,
}

impl SatchelError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_code: None,
            reset_delay: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unreachable, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    pub fn rate_limited(message: impl Into<String>, reset_delay: Option<u64>) -> Self {
        Self {
            reset_delay,
            ..Self::new(ErrorKind::RateLimited, message)
        }
    }

    pub fn with_http_code(mut self, code: u16) -> Self {
        self.http_code = Some(code);
        self
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            ErrorKind::Usage => ExitCode::Usage,
            ErrorKind::Unauthorized | ErrorKind::MissingPermissions => ExitCode::Auth,
            ErrorKind::RateLimited => ExitCode::RateLimited,
            ErrorKind::Unreachable | ErrorKind::Generic => ExitCode::Remote,
            ErrorKind::Io => ExitCode::Io,
        }
    }
}

impl From<std::io::Error> for SatchelError {
    fn from(value: std::io::Error) -> Self {
        Self::io(value.to_string())
    }
}

impl From<&str> for SatchelError {
    fn from(value: &str) -> Self {
        Self::usage(value)
    }
}

impl From<String> for SatchelError {
    fn from(value: String) -> Self {
        Self::usage(value)
    }
}

impl<T: Display> From<(ErrorKind, T)> for SatchelError {
    fn from((kind, value): (ErrorKind, T)) -> Self {
        Self::new(kind, value.to_string())
    }
}

pub type SatchelResult<T> = Result<T, SatchelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_error_serializes_reset_delay() {
        let error = SatchelError::rate_limited("slow down", Some(120)).with_http_code(403);
        let value = serde_json::to_value(&error).expect("serialize");

        assert_eq!(value["kind"], "rate_limit");
        assert_eq!(value["kind"], error.kind.as_str());
        assert_eq!(value["http_code"], 403);
        assert_eq!(value["reset_delay"], 120);
        assert_eq!(error.exit_code(), ExitCode::RateLimited);
    }

    #[test]
    fn network_failures_omit_http_code() {
        let error = SatchelError::unreachable("connection refused");
        let value = serde_json::to_value(&error).expect("serialize");

        assert!(value.get("http_code").is_none());
        assert_eq!(value["kind"], "unreachable");
    }
}
