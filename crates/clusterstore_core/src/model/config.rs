//! Versioned cluster configuration and selection mapping models.
//!
//! # Invariants
//! - `(cluster_id, type_name, tag)` and `(cluster_id, type_name, version)` each
//!   identify at most one config.
//! - Config versions for one `(cluster_id, type_name)` start at 1 and grow by one.
//! - A mapping is identified by `(cluster_id, type_name, create_timestamp)`.

use super::cluster::ClusterId;
use super::stack::StackPk;
use super::{now_epoch_ms, require_non_empty, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Storage-assigned config identifier (`clusterconfig.config_id`).
pub type ConfigId = i64;

/// User recorded on mappings written by the store itself.
pub const DEFAULT_MAPPING_USER: &str = "_db";

/// One immutable version of a configuration type for a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub config_id: Option<ConfigId>,
    pub cluster_id: ClusterId,
    /// Configuration type, e.g. `core-site`.
    pub type_name: String,
    pub tag: String,
    pub version: i64,
    /// Stack this version belongs to.
    pub stack_pk: StackPk,
    /// JSON object of property name to value.
    pub data: String,
    /// Optional JSON object of per-property attributes.
    pub attributes: Option<String>,
    /// Epoch milliseconds.
    pub create_timestamp: i64,
}

impl ClusterConfig {
    /// Creates an unsaved config with an empty property set, stamped now.
    pub fn new(
        cluster_id: ClusterId,
        type_name: impl Into<String>,
        tag: impl Into<String>,
        version: i64,
        stack_pk: StackPk,
    ) -> Self {
        Self {
            config_id: None,
            cluster_id,
            type_name: type_name.into(),
            tag: tag.into(),
            version,
            stack_pk,
            data: "{}".to_string(),
            attributes: None,
            create_timestamp: now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_empty("type_name", &self.type_name)?;
        require_non_empty("tag", &self.tag)?;
        if self.version < 1 {
            return Err(ModelValidationError::InvalidConfigVersion(self.version));
        }
        require_json_object("config_data", &self.data)?;
        if let Some(attributes) = self.attributes.as_deref() {
            require_json_object("config_attributes", attributes)?;
        }
        Ok(())
    }

    /// Parses `data` into a property map.
    pub fn properties(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ModelValidationError> {
        parse_json_object("config_data", &self.data)
    }
}

/// Association between a cluster and one config (type, tag).
///
/// The `selected` mapping of a type is the configuration currently active for
/// that type; selecting another tag replaces the mapping rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfigMapping {
    pub cluster_id: ClusterId,
    pub type_name: String,
    pub tag: String,
    /// Epoch milliseconds; part of the mapping identity.
    pub create_timestamp: i64,
    pub selected: bool,
    pub user_name: String,
}

impl ClusterConfigMapping {
    /// Creates an unselected mapping attributed to `DEFAULT_MAPPING_USER`.
    pub fn new(
        cluster_id: ClusterId,
        type_name: impl Into<String>,
        tag: impl Into<String>,
        create_timestamp: i64,
    ) -> Self {
        Self {
            cluster_id,
            type_name: type_name.into(),
            tag: tag.into(),
            create_timestamp,
            selected: false,
            user_name: DEFAULT_MAPPING_USER.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_empty("type_name", &self.type_name)?;
        require_non_empty("tag", &self.tag)?;
        require_non_empty("user_name", &self.user_name)
    }
}

fn require_json_object(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    parse_json_object(field, value).map(|_| ())
}

fn parse_json_object(
    field: &'static str,
    value: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ModelValidationError> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(ModelValidationError::InvalidJsonObject {
            field,
            reason: "value is not an object".to_string(),
        }),
        Err(err) => Err(ModelValidationError::InvalidJsonObject {
            field,
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterConfig, ClusterConfigMapping, DEFAULT_MAPPING_USER};
    use crate::model::ModelValidationError;

    #[test]
    fn validate_requires_positive_version_and_object_payloads() {
        let mut config = ClusterConfig::new(1, "core-site", "version1", 1, 1);
        assert!(config.validate().is_ok());

        config.version = 0;
        assert_eq!(
            config.validate(),
            Err(ModelValidationError::InvalidConfigVersion(0))
        );

        config.version = 1;
        config.data = "[1, 2]".to_string();
        assert!(matches!(
            config.validate(),
            Err(ModelValidationError::InvalidJsonObject { field: "config_data", .. })
        ));

        config.data = r#"{"fs.defaultFS":"hdfs://nn:8020"}"#.to_string();
        config.attributes = Some("not json".to_string());
        assert!(matches!(
            config.validate(),
            Err(ModelValidationError::InvalidJsonObject { field: "config_attributes", .. })
        ));
    }

    #[test]
    fn properties_parse_data_object() {
        let mut config = ClusterConfig::new(1, "core-site", "version1", 1, 1);
        config.data = r#"{"fs.defaultFS":"hdfs://nn:8020"}"#.to_string();
        let properties = config.properties().unwrap();
        assert_eq!(properties["fs.defaultFS"], "hdfs://nn:8020");
    }

    #[test]
    fn mapping_defaults_to_unselected_store_user() {
        let mapping = ClusterConfigMapping::new(1, "hdfs-site", "v1", 10);
        assert!(!mapping.selected);
        assert_eq!(mapping.user_name, DEFAULT_MAPPING_USER);
        assert_eq!(
            ClusterConfigMapping::new(1, "hdfs-site", "", 10).validate(),
            Err(ModelValidationError::EmptyField("tag"))
        );
    }
}
