use chub_domain::SourceDescriptor;

use crate::error::ConfigError;

/// Parse the `CH_SOURCES` (or `CREDHUB-REF`-resolved) JSON blob into its
/// `SourceDescriptor` array (spec §6, "Source Descriptor JSON").
pub fn parse_sources(blob: &str) -> Result<Vec<SourceDescriptor>, ConfigError> {
    serde_json::from_str(blob).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Validate cross-descriptor invariants that `chub-config` can catch before
/// any source is constructed, aggregating every violation together.
///
/// `chub-credhub::CredhubSource` independently enforces the one-credhub-
/// source rule at construction time (spec §4.6); this is an earlier,
/// friendlier rejection of a startup blob that could never succeed.
pub fn validate_sources(sources: &[SourceDescriptor]) -> Result<(), ConfigError> {
    let mut reasons = Vec::new();

    let credhub_count = sources
        .iter()
        .filter(|d| matches!(d, SourceDescriptor::Credhub(_)))
        .count();
    if credhub_count > 1 {
        reasons.push(format!(
            "at most one credhub source descriptor is permitted, found {credhub_count}"
        ));
    }

    if sources.is_empty() {
        reasons.push("at least one source descriptor is required".to_string());
    }

    for (index, source) in sources.iter().enumerate() {
        if let SourceDescriptor::Git(git) = source {
            if git.uri.is_empty() {
                reasons.push(format!("source[{index}]: git uri must not be empty"));
            }
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(reasons))
    }
}
