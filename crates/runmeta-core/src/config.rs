//! Run configuration supplied by the caller.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::env::EnvSnapshot;
use crate::error::{MetaError, Result};

/// Environment flag that enables configuration overrides.
pub const AUTOMATION_FLAG: &str = "BROWSERSTACK_AUTOMATION";

/// Project/run configuration. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub run_settings: Option<RunSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub npm_dependencies: Option<HashMap<String, Value>>,
}

impl RunConfig {
    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents)?;
        if !value.is_object() {
            return Err(MetaError::InvalidConfig(
                "configuration must be a JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Version override for `name` from `run_settings.npm_dependencies`.
    ///
    /// String values are returned as-is; any other JSON value is rendered
    /// as JSON text.
    pub fn dependency_override(&self, name: &str) -> Option<String> {
        let value = self
            .run_settings
            .as_ref()?
            .npm_dependencies
            .as_ref()?
            .get(name)?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Whether the automation flag is set to `true` or `1`.
pub fn automation_enabled(env: &EnvSnapshot) -> bool {
    matches!(env.get(AUTOMATION_FLAG), Some("true") | Some("1"))
}
