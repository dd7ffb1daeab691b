/// Errors raised while assembling startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The `CH_SOURCES`/`CREDHUB-REF` blob was not valid JSON, or did not
    /// match the `SourceDescriptor` wire shape.
    #[error("failed to parse source descriptors: {0}")]
    Parse(String),

    /// One or more settings failed validation; every reason is reported
    /// together rather than failing on the first one.
    #[error("configuration validation failed: {0:?}")]
    Validation(Vec<String>),
}
