// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric error codes of the vDC API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    InvalidParams,
    NoSession,
    UnknownTarget,
    InvalidDsuid,
    Internal,
    VersionMismatch,
}

impl ApiError {
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidParams => 400,
            Self::NoSession => 401,
            Self::UnknownTarget => 404,
            Self::InvalidDsuid => 415,
            Self::Internal => 500,
            Self::VersionMismatch => 505,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParams => "INVALID_PARAMS",
            Self::NoSession => "NO_SESSION",
            Self::UnknownTarget => "UNKNOWN_TARGET",
            Self::InvalidDsuid => "INVALID_DSUID",
            Self::Internal => "INTERNAL",
            Self::VersionMismatch => "VERSION_MISMATCH",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.code(), message: message.into(), domain: "vdcapi".to_owned() }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body returned for failed methods: numeric code, human-readable
/// message, and the error domain the code belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    pub domain: String,
}

impl ErrorBody {
    pub fn new(code: u16, message: impl Into<String>, domain: impl Into<String>) -> Self {
        Self { code, message: message.into(), domain: domain.into() }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.domain, self.code)
    }
}

impl std::error::Error for ErrorBody {}
