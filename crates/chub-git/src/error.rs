use chub_error::{ChubError, ErrorCode};

/// Local failure modes for the git source, converted to [`ChubError`] at the
/// `chub-domain::Source` boundary.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// The descriptor failed validation (§4.5); carries every aggregated reason.
    #[error("invalid git source descriptor: {0}")]
    DescriptorInvalid(String),

    /// `git fetch` failed and `failOnFetch` escalated it.
    #[error("unable to fetch: {0}")]
    UnableToFetch(String),

    /// `git checkout` failed; always fatal to the request.
    #[error("unable to checkout {label}: {cause}")]
    UnableToCheckout {
        /// The ref that failed to check out.
        label: String,
        /// Captured git output.
        cause: String,
    },

    /// A bearer token could not be acquired.
    #[error("unable to obtain token: {0}")]
    TokenAcquisition(String),

    /// A property file failed to parse; caller skips the file.
    #[error("failed to parse {path}: {cause}")]
    ParseFailure {
        /// Path of the offending file.
        path: String,
        /// Parse error detail.
        cause: String,
    },
}

impl From<GitError> for ChubError {
    fn from(e: GitError) -> Self {
        let code = match &e {
            GitError::DescriptorInvalid(_) => ErrorCode::DescriptorInvalid,
            GitError::UnableToFetch(_) => ErrorCode::UnableToFetch,
            GitError::UnableToCheckout { .. } => ErrorCode::UnableToCheckout,
            GitError::TokenAcquisition(_) => ErrorCode::TokenAcquisition,
            GitError::ParseFailure { .. } => ErrorCode::ParseFailure,
        };
        ChubError::new(code, e.to_string())
    }
}
