//! Cluster configuration repository contract and SQLite implementation.
//!
//! # Invariants
//! - Next version for `(cluster, type)` is `COALESCE(MAX(version), 0) + 1`.
//! - Latest-per-type selection picks the highest version, then the highest
//!   `config_id`, so the result is deterministic.
//! - An unknown stack never errors; it selects no rows.

use super::query::{execute_update, select_list, select_one, select_single};
use super::stack_repo::{SqliteStackRepository, StackRepository};
use super::{ensure_table_ready, RepoError, RepoResult};
use crate::model::cluster::ClusterId;
use crate::model::config::{ClusterConfig, ConfigId};
use crate::model::stack::StackId;
use crate::session::UnitOfWork;
use log::debug;
use rusqlite::{params, Connection, Row};

const CONFIG_COLUMN_LIST: &str = "config_id,
    version_tag,
    version,
    type_name,
    cluster_id,
    stack_id,
    config_data,
    config_attributes,
    create_timestamp";

const CONFIG_COLUMNS: &[&str] = &[
    "config_id",
    "version_tag",
    "version",
    "type_name",
    "cluster_id",
    "stack_id",
    "config_data",
    "config_attributes",
    "create_timestamp",
];

/// Repository interface for versioned cluster configurations.
pub trait ClusterConfigRepository {
    fn find_config(&self, config_id: ConfigId) -> RepoResult<Option<ClusterConfig>>;
    fn find_config_by_tag(
        &self,
        cluster_id: ClusterId,
        type_name: &str,
        tag: &str,
    ) -> RepoResult<Option<ClusterConfig>>;
    fn find_config_by_version(
        &self,
        cluster_id: ClusterId,
        type_name: &str,
        version: i64,
    ) -> RepoResult<Option<ClusterConfig>>;
    /// Returns the version the next config of `type_name` should carry.
    fn find_next_config_version(&self, cluster_id: ClusterId, type_name: &str) -> RepoResult<i64>;
    /// Every version of every type for the cluster within `stack`.
    fn get_all_configurations(
        &self,
        cluster_id: ClusterId,
        stack: &StackId,
    ) -> RepoResult<Vec<ClusterConfig>>;
    /// One config per type: the newest version within `stack`.
    fn get_latest_configurations(
        &self,
        cluster_id: ClusterId,
        stack: &StackId,
    ) -> RepoResult<Vec<ClusterConfig>>;
    fn create_config(&self, config: &ClusterConfig) -> RepoResult<ClusterConfig>;
    fn remove_config(&self, config: &ClusterConfig) -> RepoResult<()>;
}

pub struct SqliteClusterConfigRepository<'a, 'conn> {
    uow: &'a UnitOfWork<'conn>,
    stacks: SqliteStackRepository<'a, 'conn>,
}

impl<'a, 'conn> SqliteClusterConfigRepository<'a, 'conn> {
    pub fn try_new(uow: &'a UnitOfWork<'conn>) -> RepoResult<Self> {
        let stacks = SqliteStackRepository::try_new(uow)?;
        ensure_table_ready(uow.connection(), "clusterconfig", CONFIG_COLUMNS)?;
        Ok(Self { uow, stacks })
    }

    fn conn(&self) -> &Connection {
        self.uow.connection()
    }
}

impl ClusterConfigRepository for SqliteClusterConfigRepository<'_, '_> {
    fn find_config(&self, config_id: ConfigId) -> RepoResult<Option<ClusterConfig>> {
        self.uow.flush()?;
        select_one(
            self.conn(),
            &format!("SELECT {CONFIG_COLUMN_LIST} FROM clusterconfig WHERE config_id = ?1;"),
            [config_id],
            parse_config_row,
        )
    }

    fn find_config_by_tag(
        &self,
        cluster_id: ClusterId,
        type_name: &str,
        tag: &str,
    ) -> RepoResult<Option<ClusterConfig>> {
        self.uow.flush()?;
        select_one(
            self.conn(),
            &format!(
                "SELECT {CONFIG_COLUMN_LIST}
                 FROM clusterconfig
                 WHERE cluster_id = ?1
                   AND type_name = ?2
                   AND version_tag = ?3
                 ORDER BY config_id ASC;"
            ),
            params![cluster_id, type_name, tag],
            parse_config_row,
        )
    }

    fn find_config_by_version(
        &self,
        cluster_id: ClusterId,
        type_name: &str,
        version: i64,
    ) -> RepoResult<Option<ClusterConfig>> {
        self.uow.flush()?;
        select_one(
            self.conn(),
            &format!(
                "SELECT {CONFIG_COLUMN_LIST}
                 FROM clusterconfig
                 WHERE cluster_id = ?1
                   AND type_name = ?2
                   AND version = ?3
                 ORDER BY config_id ASC;"
            ),
            params![cluster_id, type_name, version],
            parse_config_row,
        )
    }

    fn find_next_config_version(&self, cluster_id: ClusterId, type_name: &str) -> RepoResult<i64> {
        self.uow.flush()?;
        select_single(
            self.conn(),
            "SELECT COALESCE(MAX(version), 0) + 1
             FROM clusterconfig
             WHERE cluster_id = ?1
               AND type_name = ?2;",
            params![cluster_id, type_name],
        )
    }

    fn get_all_configurations(
        &self,
        cluster_id: ClusterId,
        stack: &StackId,
    ) -> RepoResult<Vec<ClusterConfig>> {
        let Some(stack) = self.stacks.resolve(stack)? else {
            return Ok(Vec::new());
        };
        self.uow.flush()?;
        select_list(
            self.conn(),
            &format!(
                "SELECT {CONFIG_COLUMN_LIST}
                 FROM clusterconfig
                 WHERE cluster_id = ?1
                   AND stack_id = ?2
                 ORDER BY type_name ASC, version ASC, config_id ASC;"
            ),
            params![cluster_id, stack.pk],
            parse_config_row,
        )
    }

    fn get_latest_configurations(
        &self,
        cluster_id: ClusterId,
        stack: &StackId,
    ) -> RepoResult<Vec<ClusterConfig>> {
        let Some(stack) = self.stacks.resolve(stack)? else {
            return Ok(Vec::new());
        };
        self.uow.flush()?;
        select_list(
            self.conn(),
            &format!(
                "SELECT {CONFIG_COLUMN_LIST}
                 FROM (
                    SELECT
                        {CONFIG_COLUMN_LIST},
                        ROW_NUMBER() OVER (
                            PARTITION BY type_name
                            ORDER BY version DESC, config_id DESC
                        ) AS type_rank
                    FROM clusterconfig
                    WHERE cluster_id = ?1
                      AND stack_id = ?2
                 )
                 WHERE type_rank = 1
                 ORDER BY type_name ASC;"
            ),
            params![cluster_id, stack.pk],
            parse_config_row,
        )
    }

    fn create_config(&self, config: &ClusterConfig) -> RepoResult<ClusterConfig> {
        config.validate()?;
        self.uow.flush()?;
        self.conn().execute(
            "INSERT INTO clusterconfig (
                config_id,
                version_tag,
                version,
                type_name,
                cluster_id,
                stack_id,
                config_data,
                config_attributes,
                create_timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                config.config_id,
                config.tag.as_str(),
                config.version,
                config.type_name.as_str(),
                config.cluster_id,
                config.stack_pk,
                config.data.as_str(),
                config.attributes.as_deref(),
                config.create_timestamp,
            ],
        )?;

        let mut persisted = config.clone();
        persisted.config_id = Some(self.conn().last_insert_rowid());
        debug!(
            "event=config_create module=repo status=ok cluster_id={} type={} version={}",
            persisted.cluster_id, persisted.type_name, persisted.version
        );
        Ok(persisted)
    }

    fn remove_config(&self, config: &ClusterConfig) -> RepoResult<()> {
        self.uow.flush()?;
        let deleted = match config.config_id {
            Some(config_id) => execute_update(
                self.conn(),
                "DELETE FROM clusterconfig WHERE config_id = ?1;",
                [config_id],
            )?,
            None => execute_update(
                self.conn(),
                "DELETE FROM clusterconfig
                 WHERE cluster_id = ?1
                   AND type_name = ?2
                   AND version_tag = ?3;",
                params![config.cluster_id, config.type_name.as_str(), config.tag.as_str()],
            )?,
        };

        if deleted == 0 {
            return Err(RepoError::not_found(
                "cluster config",
                format!("{}/{}/{}", config.cluster_id, config.type_name, config.tag),
            ));
        }
        debug!(
            "event=config_remove module=repo status=ok cluster_id={} type={} tag={}",
            config.cluster_id, config.type_name, config.tag
        );
        Ok(())
    }
}

fn parse_config_row(row: &Row<'_>) -> RepoResult<ClusterConfig> {
    Ok(ClusterConfig {
        config_id: Some(row.get("config_id")?),
        cluster_id: row.get("cluster_id")?,
        type_name: row.get("type_name")?,
        tag: row.get("version_tag")?,
        version: row.get("version")?,
        stack_pk: row.get("stack_id")?,
        data: row.get("config_data")?,
        attributes: row.get("config_attributes")?,
        create_timestamp: row.get("create_timestamp")?,
    })
}
