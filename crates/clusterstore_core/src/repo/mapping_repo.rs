//! Cluster configuration mapping repository contract and SQLite implementation.
//!
//! # Invariants
//! - Mapping identity is `(cluster_id, type_name, create_timestamp)`; merge
//!   upserts on it.
//! - Bulk delete by types with an empty type list never reaches storage.
//! - Batch merge applies mappings in order and stops at the first failure;
//!   earlier merges stay in the unit of work.

use super::query::{execute_update, numbered_placeholders, select_list};
use super::stack_repo::{SqliteStackRepository, StackRepository};
use super::{bool_to_int, ensure_table_ready, int_to_bool, RepoError, RepoResult};
use crate::model::cluster::ClusterId;
use crate::model::config::ClusterConfigMapping;
use crate::model::stack::StackId;
use crate::session::UnitOfWork;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const MAPPING_COLUMNS: &[&str] = &[
    "cluster_id",
    "type_name",
    "version_tag",
    "create_timestamp",
    "selected",
    "user_name",
];

/// Repository interface for config selection mappings.
pub trait ConfigMappingRepository {
    /// Mappings whose (type, tag) points at a config of `stack`.
    fn get_cluster_config_mappings_by_stack(
        &self,
        cluster_id: ClusterId,
        stack: &StackId,
    ) -> RepoResult<Vec<ClusterConfigMapping>>;
    fn get_cluster_config_mapping_entities_by_cluster(
        &self,
        cluster_id: ClusterId,
    ) -> RepoResult<Vec<ClusterConfigMapping>>;
    fn merge_config_mapping(&self, mapping: &ClusterConfigMapping)
        -> RepoResult<ClusterConfigMapping>;
    fn merge_config_mappings(&self, mappings: &[ClusterConfigMapping]) -> RepoResult<()>;
    fn persist_config_mapping(&self, mapping: &ClusterConfigMapping) -> RepoResult<()>;
    fn remove_config_mapping(&self, mapping: &ClusterConfigMapping) -> RepoResult<()>;
    /// Deletes the cluster's mappings whose type is in `types`, returning the
    /// number of deleted rows.
    fn remove_cluster_config_mapping_entity_by_types(
        &self,
        cluster_id: ClusterId,
        types: &[String],
    ) -> RepoResult<usize>;
}

pub struct SqliteConfigMappingRepository<'a, 'conn> {
    uow: &'a UnitOfWork<'conn>,
    stacks: SqliteStackRepository<'a, 'conn>,
}

impl<'a, 'conn> SqliteConfigMappingRepository<'a, 'conn> {
    pub fn try_new(uow: &'a UnitOfWork<'conn>) -> RepoResult<Self> {
        let stacks = SqliteStackRepository::try_new(uow)?;
        ensure_table_ready(uow.connection(), "clusterconfigmapping", MAPPING_COLUMNS)?;
        Ok(Self { uow, stacks })
    }

    fn conn(&self) -> &Connection {
        self.uow.connection()
    }
}

impl ConfigMappingRepository for SqliteConfigMappingRepository<'_, '_> {
    fn get_cluster_config_mappings_by_stack(
        &self,
        cluster_id: ClusterId,
        stack: &StackId,
    ) -> RepoResult<Vec<ClusterConfigMapping>> {
        let Some(stack) = self.stacks.resolve(stack)? else {
            return Ok(Vec::new());
        };
        self.uow.flush()?;
        select_list(
            self.conn(),
            "SELECT
                mapping.cluster_id,
                mapping.type_name,
                mapping.version_tag,
                mapping.create_timestamp,
                mapping.selected,
                mapping.user_name
             FROM clusterconfigmapping mapping
             INNER JOIN clusterconfig config
                ON config.cluster_id = mapping.cluster_id
               AND config.type_name = mapping.type_name
               AND config.version_tag = mapping.version_tag
             WHERE mapping.cluster_id = ?1
               AND config.stack_id = ?2
             ORDER BY mapping.type_name ASC, mapping.create_timestamp ASC;",
            params![cluster_id, stack.pk],
            parse_mapping_row,
        )
    }

    fn get_cluster_config_mapping_entities_by_cluster(
        &self,
        cluster_id: ClusterId,
    ) -> RepoResult<Vec<ClusterConfigMapping>> {
        self.uow.flush()?;
        select_list(
            self.conn(),
            "SELECT
                cluster_id,
                type_name,
                version_tag,
                create_timestamp,
                selected,
                user_name
             FROM clusterconfigmapping
             WHERE cluster_id = ?1
             ORDER BY type_name ASC, create_timestamp ASC;",
            [cluster_id],
            parse_mapping_row,
        )
    }

    fn merge_config_mapping(
        &self,
        mapping: &ClusterConfigMapping,
    ) -> RepoResult<ClusterConfigMapping> {
        mapping.validate()?;
        self.uow.flush()?;
        self.conn().execute(
            "INSERT INTO clusterconfigmapping (
                cluster_id,
                type_name,
                version_tag,
                create_timestamp,
                selected,
                user_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (cluster_id, type_name, create_timestamp) DO UPDATE SET
                version_tag = excluded.version_tag,
                selected = excluded.selected,
                user_name = excluded.user_name;",
            mapping_params(mapping),
        )?;
        debug!(
            "event=mapping_merge module=repo status=ok cluster_id={} type={} tag={} selected={}",
            mapping.cluster_id, mapping.type_name, mapping.tag, mapping.selected
        );
        Ok(mapping.clone())
    }

    fn merge_config_mappings(&self, mappings: &[ClusterConfigMapping]) -> RepoResult<()> {
        for mapping in mappings {
            self.merge_config_mapping(mapping)?;
        }
        Ok(())
    }

    fn persist_config_mapping(&self, mapping: &ClusterConfigMapping) -> RepoResult<()> {
        mapping.validate()?;
        self.uow.flush()?;
        self.conn().execute(
            "INSERT INTO clusterconfigmapping (
                cluster_id,
                type_name,
                version_tag,
                create_timestamp,
                selected,
                user_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            mapping_params(mapping),
        )?;
        debug!(
            "event=mapping_persist module=repo status=ok cluster_id={} type={} tag={}",
            mapping.cluster_id, mapping.type_name, mapping.tag
        );
        Ok(())
    }

    fn remove_config_mapping(&self, mapping: &ClusterConfigMapping) -> RepoResult<()> {
        self.uow.flush()?;
        let deleted = execute_update(
            self.conn(),
            "DELETE FROM clusterconfigmapping
             WHERE cluster_id = ?1
               AND type_name = ?2
               AND create_timestamp = ?3;",
            params![
                mapping.cluster_id,
                mapping.type_name.as_str(),
                mapping.create_timestamp
            ],
        )?;
        if deleted == 0 {
            return Err(RepoError::not_found(
                "cluster config mapping",
                format!(
                    "{}/{}/{}",
                    mapping.cluster_id, mapping.type_name, mapping.create_timestamp
                ),
            ));
        }
        Ok(())
    }

    fn remove_cluster_config_mapping_entity_by_types(
        &self,
        cluster_id: ClusterId,
        types: &[String],
    ) -> RepoResult<usize> {
        if types.is_empty() {
            return Ok(0);
        }

        self.uow.flush()?;
        let sql = format!(
            "DELETE FROM clusterconfigmapping
             WHERE cluster_id = ?1
               AND type_name IN ({});",
            numbered_placeholders(2, types.len())
        );
        let mut bind_values = Vec::with_capacity(types.len() + 1);
        bind_values.push(Value::Integer(cluster_id));
        bind_values.extend(types.iter().map(|value| Value::Text(value.clone())));

        let deleted = execute_update(self.conn(), &sql, params_from_iter(bind_values))?;
        debug!(
            "event=mapping_remove_by_types module=repo status=ok cluster_id={} types={} deleted={}",
            cluster_id,
            types.len(),
            deleted
        );
        Ok(deleted)
    }
}

fn mapping_params(mapping: &ClusterConfigMapping) -> [Value; 6] {
    [
        Value::Integer(mapping.cluster_id),
        Value::Text(mapping.type_name.clone()),
        Value::Text(mapping.tag.clone()),
        Value::Integer(mapping.create_timestamp),
        Value::Integer(bool_to_int(mapping.selected)),
        Value::Text(mapping.user_name.clone()),
    ]
}

fn parse_mapping_row(row: &Row<'_>) -> RepoResult<ClusterConfigMapping> {
    Ok(ClusterConfigMapping {
        cluster_id: row.get("cluster_id")?,
        type_name: row.get("type_name")?,
        tag: row.get("version_tag")?,
        create_timestamp: row.get("create_timestamp")?,
        selected: int_to_bool(row.get("selected")?, "clusterconfigmapping.selected")?,
        user_name: row.get("user_name")?,
    })
}
