// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-side error taxonomy.
//!
//! API errors carry the numeric codes of the north-bound protocol;
//! transport, persistence and backend errors are wrapped so callers can
//! decide between failing a method and merely logging (notifications never
//! fail upstream, they only log).

use std::fmt;

use vdcapi::{ApiError, ErrorBody};

/// Error in a script source, with position information.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub code: u16,
    pub message: String,
    pub line: u32,
    pub char_pos: u32,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}:{}", self.message, self.line, self.char_pos)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    /// North-bound API error with protocol code.
    Api(ApiError, String),
    /// RPC transport failure.
    Transport(String),
    /// Persistent store failure.
    Persistence(String),
    /// Device backend failure (bus query, apply, discovery).
    Backend(String),
    /// Script failure with position info.
    Script(ScriptError),
}

impl HostError {
    pub fn api(code: ApiError, message: impl Into<String>) -> Self {
        Self::Api(code, message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Error body for a failed method response.
    pub fn to_error_body(&self) -> ErrorBody {
        match self {
            Self::Api(code, message) => code.to_error_body(message.clone()),
            Self::Transport(message) => ErrorBody::new(500, message.clone(), "transport"),
            Self::Persistence(message) => ErrorBody::new(500, message.clone(), "persistence"),
            Self::Backend(message) => ErrorBody::new(500, message.clone(), "backend"),
            Self::Script(err) => ErrorBody::new(err.code, err.to_string(), "script"),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(code, message) => write!(f, "{code}: {message}"),
            Self::Transport(message) => write!(f, "transport: {message}"),
            Self::Persistence(message) => write!(f, "persistence: {message}"),
            Self::Backend(message) => write!(f, "backend: {message}"),
            Self::Script(err) => write!(f, "script: {err}"),
        }
    }
}

impl std::error::Error for HostError {}

pub type HostResult<T> = Result<T, HostError>;
