use std::fmt::{self, Debug, Formatter};

use serde_json::Value;

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// Selects a model and carries the credential used to reach it.
///
/// How the selector and the key are interpreted is up to the
/// [`ModelConnector`](crate::ModelConnector). A missing key usually
/// means the connector falls back to its own defaults.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ModelConfig {
    /// The model selector, e.g. a model name.
    pub model: String,
    /// An optional API key.
    pub api_key: Option<String>,
}

impl ModelConfig {
    /// Creates a config for the given model selector.
    #[inline]
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            api_key: None,
        }
    }

    /// Sets the API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl Debug for ModelConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ModelConfig::new("gpt-mini").with_api_key("sk-secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("gpt-mini"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("sk-secret"));
    }
}
