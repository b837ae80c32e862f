//! Resolver configuration
//!
//! Settings load from YAML or JSON; missing keys take their defaults.
//!
//! ```yaml
//! follow_derivation: true
//! max_distance: 3
//! default_time_signature:
//!   beats: 4
//!   beat_type: 4
//! ```

use crate::errors::SettingsError;
use crate::models::notation::TimeSignatureData;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for [`ContextResolver`](crate::context::ContextResolver)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Continue with derivation origins when an element's own sites give
    /// no answer
    pub follow_derivation: bool,

    /// Deepest context level searched (1 = direct containers only);
    /// `None` searches the whole hierarchy
    pub max_distance: Option<usize>,

    /// Time signature assumed when none is found in context
    pub default_time_signature: Option<TimeSignatureData>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            follow_derivation: true,
            max_distance: None,
            default_time_signature: None,
        }
    }
}

impl ResolverSettings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a file; `.json` files are JSON, anything else YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let settings = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_yaml_str(&text)?
        };
        log::debug!("loaded resolver settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn to_yaml_string(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
