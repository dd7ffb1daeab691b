// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for config-hub.
//!
//! Every classified error carries an [`ErrorCode`] (a machine-readable,
//! stable string tag), a human-readable message, and an optional source
//! error. Component crates define their own `thiserror::Error` enums for
//! local failure modes and convert into [`ChubError`] at their API
//! boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Git source / repository errors.
    Git,
    /// Credhub source / credential index errors.
    Credhub,
    /// Source descriptor / startup configuration errors.
    Config,
    /// Aggregator fan-out and merge errors.
    Aggregation,
    /// Property parsing and flattening errors.
    Properties,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Git => "git",
            Self::Credhub => "credhub",
            Self::Config => "config",
            Self::Aggregation => "aggregation",
            Self::Properties => "properties",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code (see spec §7 "Error kinds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A source descriptor failed validation at startup.
    DescriptorInvalid,
    /// A second credhub source descriptor was constructed.
    OnlyOneCredhubSource,
    /// A git fetch failed and `failOnFetch` escalated it.
    UnableToFetch,
    /// A git checkout failed (always fatal to the request).
    UnableToCheckout,
    /// A bearer token could not be acquired.
    TokenAcquisition,
    /// A property file failed to parse; the file is skipped.
    ParseFailure,
    /// The credential store could not be listed.
    StoreUnavailable,
    /// An existing credential could not be read back.
    CredentialReadFailure,
}

impl ErrorCode {
    /// The [`ErrorCategory`] this code is classified under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DescriptorInvalid => ErrorCategory::Config,
            Self::OnlyOneCredhubSource => ErrorCategory::Credhub,
            Self::UnableToFetch | Self::UnableToCheckout | Self::TokenAcquisition => {
                ErrorCategory::Git
            }
            Self::ParseFailure => ErrorCategory::Properties,
            Self::StoreUnavailable | Self::CredentialReadFailure => ErrorCategory::Credhub,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DescriptorInvalid => "DESCRIPTOR_INVALID",
            Self::OnlyOneCredhubSource => "ONLY_ONE_CREDHUB_SOURCE",
            Self::UnableToFetch => "UNABLE_TO_FETCH",
            Self::UnableToCheckout => "UNABLE_TO_CHECKOUT",
            Self::TokenAcquisition => "TOKEN_ACQUISITION",
            Self::ParseFailure => "PARSE_FAILURE",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::CredentialReadFailure => "CREDENTIAL_READ_FAILURE",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ChubError
// ---------------------------------------------------------------------------

/// A classified error carrying a stable [`ErrorCode`] plus a human message.
#[derive(Debug)]
pub struct ChubError {
    /// The stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Underlying cause, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ChubError {
    /// Construct a new classified error with no source.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for ChubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ChubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
