use chub_error::{ChubError, ErrorCode};

/// Local failure modes for the credhub source, converted to [`ChubError`] at
/// the `chub_domain::Source` boundary.
#[derive(Debug, thiserror::Error)]
pub enum CredhubError {
    /// A second `CredhubDescriptor` was constructed in this process.
    #[error("only one credhub source is allowed per process")]
    OnlyOneCredhubSource,

    /// The descriptor failed validation.
    #[error("invalid credhub source descriptor: {0}")]
    DescriptorInvalid(String),

    /// Listing or searching the store failed.
    #[error("credhub store unavailable: {0}")]
    StoreUnavailable(String),

    /// An existing credential could not be read back.
    #[error("failed to read credential {name}: {cause}")]
    CredentialReadFailure {
        /// Full credential name.
        name: String,
        /// Underlying cause.
        cause: String,
    },
}

impl From<CredhubError> for ChubError {
    fn from(e: CredhubError) -> Self {
        let code = match &e {
            CredhubError::OnlyOneCredhubSource => ErrorCode::OnlyOneCredhubSource,
            CredhubError::DescriptorInvalid(_) => ErrorCode::DescriptorInvalid,
            CredhubError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            CredhubError::CredentialReadFailure { .. } => ErrorCode::CredentialReadFailure,
        };
        ChubError::new(code, e.to_string())
    }
}
