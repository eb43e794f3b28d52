//! Cluster domain model.
//!
//! # Invariants
//! - `name` is unique across clusters, non-empty and at most
//!   `MAX_CLUSTER_NAME_CHARS` characters.
//! - `resource_id` is unique across clusters.

use super::{ModelValidationError, MAX_CLUSTER_NAME_CHARS};
use serde::{Deserialize, Serialize};

/// Storage-assigned cluster identifier (`clusters.cluster_id`).
pub type ClusterId = i64;

/// Provisioning lifecycle recorded on the cluster row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    #[default]
    Init,
    Installing,
    InstallFailed,
    Installed,
    Unknown,
}

impl ProvisioningState {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Installing => "INSTALLING",
            Self::InstallFailed => "INSTALL_FAILED",
            Self::Installed => "INSTALLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "INIT" => Some(Self::Init),
            "INSTALLING" => Some(Self::Installing),
            "INSTALL_FAILED" => Some(Self::InstallFailed),
            "INSTALLED" => Some(Self::Installed),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Security mode of a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityType {
    #[default]
    None,
    Kerberos,
}

impl SecurityType {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Kerberos => "KERBEROS",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(Self::None),
            "KERBEROS" => Some(Self::Kerberos),
            _ => None,
        }
    }
}

/// One managed cluster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// `None` until the row has been inserted.
    pub id: Option<ClusterId>,
    pub name: String,
    /// Link to the external authorization resource.
    pub resource_id: i64,
    pub provisioning_state: ProvisioningState,
    pub security_type: SecurityType,
    /// Free-form descriptive text.
    pub cluster_info: String,
}

impl Cluster {
    /// Creates an unsaved cluster with default state.
    pub fn new(name: impl Into<String>, resource_id: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            resource_id,
            provisioning_state: ProvisioningState::default(),
            security_type: SecurityType::default(),
            cluster_info: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::EmptyClusterName);
        }
        let chars = self.name.chars().count();
        if chars > MAX_CLUSTER_NAME_CHARS {
            return Err(ModelValidationError::ClusterNameTooLong { chars });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cluster, ProvisioningState, SecurityType};
    use crate::model::ModelValidationError;

    #[test]
    fn new_cluster_is_unsaved_with_defaults() {
        let cluster = Cluster::new("c1", 4);
        assert_eq!(cluster.id, None);
        assert_eq!(cluster.provisioning_state, ProvisioningState::Init);
        assert_eq!(cluster.security_type, SecurityType::None);
        assert!(cluster.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_oversized_names() {
        assert_eq!(
            Cluster::new("  ", 1).validate(),
            Err(ModelValidationError::EmptyClusterName)
        );
        assert_eq!(
            Cluster::new("x".repeat(101), 1).validate(),
            Err(ModelValidationError::ClusterNameTooLong { chars: 101 })
        );
    }

    #[test]
    fn db_strings_round_trip() {
        for state in [
            ProvisioningState::Init,
            ProvisioningState::Installing,
            ProvisioningState::InstallFailed,
            ProvisioningState::Installed,
            ProvisioningState::Unknown,
        ] {
            assert_eq!(ProvisioningState::from_db_str(state.as_db_str()), Some(state));
        }
        assert_eq!(SecurityType::from_db_str("KERBEROS"), Some(SecurityType::Kerberos));
        assert_eq!(SecurityType::from_db_str("kerberos"), None);
    }
}
