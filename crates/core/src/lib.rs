//! Shared primitives for all Rust crates in cisync.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across cisync crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Reconciliation error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Missing or malformed event field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Event could not be mapped to a configuration item.
    #[error("transform error: {0}")]
    Transform(String),

    /// CMDB could not be reached in time, refused credentials or is overloaded.
    #[error("cmdb unavailable: {0}")]
    CmdbUnavailable(String),

    /// CMDB answered with a response this engine does not understand.
    #[error("cmdb conflict: {0}")]
    CmdbConflict(String),

    /// Caller failed signature or secret verification.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transform(_) => ErrorKind::Transform,
            Self::CmdbUnavailable(_) => ErrorKind::CmdbUnavailable,
            Self::CmdbConflict(_) => ErrorKind::CmdbConflict,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns whether redelivering the same event may succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Returns the message without the category prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation(detail)
            | Self::Transform(detail)
            | Self::CmdbUnavailable(detail)
            | Self::CmdbConflict(detail)
            | Self::Unauthorized(detail)
            | Self::NotFound(detail)
            | Self::Internal(detail) => detail.as_str(),
        }
    }

    /// Rebuilds an error from its stored category and detail.
    #[must_use]
    pub fn from_kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            ErrorKind::Validation => Self::Validation(detail),
            ErrorKind::Transform => Self::Transform(detail),
            ErrorKind::CmdbUnavailable => Self::CmdbUnavailable(detail),
            ErrorKind::CmdbConflict => Self::CmdbConflict(detail),
            ErrorKind::Unauthorized => Self::Unauthorized(detail),
            ErrorKind::NotFound => Self::NotFound(detail),
            ErrorKind::Internal => Self::Internal(detail),
        }
    }
}

/// Payload-free error category used for storage and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`AppError::Validation`].
    Validation,
    /// See [`AppError::Transform`].
    Transform,
    /// See [`AppError::CmdbUnavailable`].
    CmdbUnavailable,
    /// See [`AppError::CmdbConflict`].
    CmdbConflict,
    /// See [`AppError::Unauthorized`].
    Unauthorized,
    /// See [`AppError::NotFound`].
    NotFound,
    /// See [`AppError::Internal`].
    Internal,
}

impl ErrorKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transform => "transform",
            Self::CmdbUnavailable => "cmdb_unavailable",
            Self::CmdbConflict => "cmdb_conflict",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "validation" => Ok(Self::Validation),
            "transform" => Ok(Self::Transform),
            "cmdb_unavailable" => Ok(Self::CmdbUnavailable),
            "cmdb_conflict" => Ok(Self::CmdbConflict),
            "unauthorized" => Ok(Self::Unauthorized),
            "not_found" => Ok(Self::NotFound),
            "internal" => Ok(Self::Internal),
            _ => Err(AppError::Validation(format!("unknown error kind '{value}'"))),
        }
    }

    /// Only CMDB availability problems are worth redelivering.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CmdbUnavailable)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
