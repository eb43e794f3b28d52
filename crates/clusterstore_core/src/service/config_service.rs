//! Configuration use-case service.
//!
//! # Responsibility
//! - Allocate config versions and persist new config versions.
//! - Switch the selected mapping of a config type.
//!
//! # Invariants
//! - At most one mapping per (cluster, type) is selected after `select_config`.
//! - Mapping timestamps for one (cluster, type) strictly increase.

use crate::model::cluster::ClusterId;
use crate::model::config::{ClusterConfig, ClusterConfigMapping};
use crate::model::now_epoch_ms;
use crate::model::stack::Stack;
use crate::repo::config_repo::ClusterConfigRepository;
use crate::repo::mapping_repo::ConfigMappingRepository;
use crate::repo::{RepoError, RepoResult};
use log::info;
use serde_json::{Map, Value};

/// Property payload of one config version.
pub type ConfigProperties = Map<String, Value>;

pub struct ConfigService<C: ClusterConfigRepository, M: ConfigMappingRepository> {
    configs: C,
    mappings: M,
}

impl<C: ClusterConfigRepository, M: ConfigMappingRepository> ConfigService<C, M> {
    pub fn new(configs: C, mappings: M) -> Self {
        Self { configs, mappings }
    }

    /// Persists `properties` as the next version of `type_name`.
    pub fn add_config(
        &self,
        cluster_id: ClusterId,
        type_name: &str,
        tag: &str,
        properties: &ConfigProperties,
        attributes: Option<&ConfigProperties>,
        stack: &Stack,
    ) -> RepoResult<ClusterConfig> {
        let version = self.configs.find_next_config_version(cluster_id, type_name)?;
        let mut config = ClusterConfig::new(cluster_id, type_name, tag, version, stack.pk);
        config.data = Value::Object(properties.clone()).to_string();
        config.attributes = attributes.map(|value| Value::Object(value.clone()).to_string());
        self.configs.create_config(&config)
    }

    /// Makes `tag` the selected config of `type_name`.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no config carries `(type_name, tag)`.
    pub fn select_config(
        &self,
        cluster_id: ClusterId,
        type_name: &str,
        tag: &str,
        user_name: &str,
    ) -> RepoResult<ClusterConfigMapping> {
        if self
            .configs
            .find_config_by_tag(cluster_id, type_name, tag)?
            .is_none()
        {
            return Err(RepoError::not_found(
                "cluster config",
                format!("{cluster_id}/{type_name}/{tag}"),
            ));
        }

        let same_type: Vec<ClusterConfigMapping> = self
            .mappings
            .get_cluster_config_mapping_entities_by_cluster(cluster_id)?
            .into_iter()
            .filter(|mapping| mapping.type_name == type_name)
            .collect();

        let deselected: Vec<ClusterConfigMapping> = same_type
            .iter()
            .filter(|mapping| mapping.selected)
            .map(|mapping| ClusterConfigMapping {
                selected: false,
                ..mapping.clone()
            })
            .collect();
        self.mappings.merge_config_mappings(&deselected)?;

        let last_timestamp = same_type
            .iter()
            .map(|mapping| mapping.create_timestamp)
            .max();
        let create_timestamp = match last_timestamp {
            Some(last) => now_epoch_ms().max(last + 1),
            None => now_epoch_ms(),
        };

        let mut mapping = ClusterConfigMapping::new(cluster_id, type_name, tag, create_timestamp);
        mapping.selected = true;
        mapping.user_name = user_name.to_string();
        self.mappings.persist_config_mapping(&mapping)?;

        info!(
            "event=config_select module=service status=ok cluster_id={} type={} tag={} deselected={}",
            cluster_id,
            type_name,
            tag,
            deselected.len()
        );
        Ok(mapping)
    }

    /// Currently selected mapping per type, ordered by type.
    pub fn selected_mappings(
        &self,
        cluster_id: ClusterId,
    ) -> RepoResult<Vec<ClusterConfigMapping>> {
        Ok(self
            .mappings
            .get_cluster_config_mapping_entities_by_cluster(cluster_id)?
            .into_iter()
            .filter(|mapping| mapping.selected)
            .collect())
    }

    pub fn configs(&self) -> &C {
        &self.configs
    }

    pub fn mappings(&self) -> &M {
        &self.mappings
    }
}
