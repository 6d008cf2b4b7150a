//! YAML configuration for a set of registrations.
//!
//! ```yaml
//! registrations:
//!   - name: search
//!     target: "localhost:50051"
//!     options:
//!       negotiationType: plaintext
//!       keepAliveTime: 30s
//!   - name: offline
//!     target: "search.internal:443"
//!     auto_discovery: false
//!     group_set_file: /var/lib/tools/offline.pb
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolBridgeConfig {
    #[serde(default)]
    pub registrations: Vec<RegistrationConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationConfig {
    pub name: String,

    /// `host:port` or a full URI.
    pub target: String,

    /// Channel options, see `GrpcChannelOptions`.
    #[serde(default)]
    pub options: HashMap<String, String>,

    /// Discover tools over server reflection at startup.
    #[serde(default = "default_true")]
    pub auto_discovery: bool,

    /// Restore tools from a saved snapshot instead of discovering them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_set_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl ToolBridgeConfig {
    pub fn from_yaml(yaml: &str) -> RegistryResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub async fn from_file(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml(&content)
    }

    /// Names must be unique and non-empty; targets non-empty.
    pub fn validate(&self) -> RegistryResult<()> {
        let mut seen = HashSet::new();
        for registration in &self.registrations {
            if registration.name.trim().is_empty() {
                return Err(RegistryError::Config(
                    "registration name must not be empty".to_string(),
                ));
            }
            if registration.target.trim().is_empty() {
                return Err(RegistryError::Config(format!(
                    "registration '{}' has an empty target",
                    registration.name
                )));
            }
            if !seen.insert(registration.name.as_str()) {
                return Err(RegistryError::Config(format!(
                    "duplicate registration '{}'",
                    registration.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = ToolBridgeConfig::from_yaml(
            r#"
registrations:
  - name: search
    target: "localhost:50051"
    options:
      negotiationType: plaintext
  - name: offline
    target: "search.internal:443"
    auto_discovery: false
    group_set_file: /tmp/offline.pb
"#,
        )
        .unwrap();
        config.validate().unwrap();

        let search = &config.registrations[0];
        assert!(search.auto_discovery);
        assert_eq!(search.options["negotiationType"], "plaintext");
        assert!(search.group_set_file.is_none());

        let offline = &config.registrations[1];
        assert!(!offline.auto_discovery);
        assert_eq!(
            offline.group_set_file.as_deref(),
            Some(Path::new("/tmp/offline.pb"))
        );
    }

    #[test]
    fn test_empty_document_has_no_registrations() {
        let config = ToolBridgeConfig::from_yaml("{}").unwrap();
        assert!(config.registrations.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicates_and_blanks() {
        let duplicate = ToolBridgeConfig::from_yaml(
            "registrations: [{name: a, target: 'x:1'}, {name: a, target: 'y:1'}]",
        )
        .unwrap();
        assert!(matches!(duplicate.validate(), Err(RegistryError::Config(_))));

        let blank_target =
            ToolBridgeConfig::from_yaml("registrations: [{name: a, target: ''}]").unwrap();
        assert!(matches!(blank_target.validate(), Err(RegistryError::Config(_))));

        let blank_name =
            ToolBridgeConfig::from_yaml("registrations: [{name: ' ', target: 'x:1'}]").unwrap();
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn test_missing_target_is_a_yaml_error() {
        assert!(matches!(
            ToolBridgeConfig::from_yaml("registrations: [{name: a}]"),
            Err(RegistryError::Yaml(_))
        ));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.yaml");
        std::fs::write(&path, "registrations:\n  - name: a\n    target: 'x:1'\n").unwrap();
        let config = ToolBridgeConfig::from_file(&path).await.unwrap();
        assert_eq!(config.registrations[0].name, "a");
    }
}
