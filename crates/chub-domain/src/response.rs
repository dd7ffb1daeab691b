use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One layer of properties contributed by a single source.
///
/// `source` is the originating source's diagnostic name (the git URI, or
/// `"credhub"`); `properties` is the flattened, dotted-path document as
/// produced by `chub-properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySource {
    /// Origin of this layer, for config-server-compatible clients.
    pub source: String,
    /// Flattened dotted-path properties.
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl PropertySource {
    /// Construct an empty property source for the given origin.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            properties: BTreeMap::new(),
        }
    }
}

/// The aggregated response returned to a `(applications, profiles, label)`
/// request, matching the config-server JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Requested application name, comma-joined if more than one.
    pub name: String,
    /// Requested profile names, in request order.
    pub profiles: Vec<String>,
    /// Resolved label, if any source used one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Layers in precedence order: index 0 overrides every later index.
    #[serde(rename = "propertySources")]
    pub property_sources: Vec<PropertySource>,
}

impl Response {
    /// Construct a response with no layers yet.
    pub fn new(name: impl Into<String>, profiles: Vec<String>, label: Option<String>) -> Self {
        Self {
            name: name.into(),
            profiles,
            label,
            property_sources: Vec::new(),
        }
    }
}
