//! Cluster repository contract and SQLite implementation.
//!
//! # Invariants
//! - Write paths call `Cluster::validate()` before SQL.
//! - Removal always merges first, so detached instances can be removed
//!   without re-fetching them. Removing a detached instance whose row no
//!   longer exists is `NotFound`.
//! - Deleting a cluster cascades to its configs and mappings.

use super::query::{execute_update, select_list, select_one};
use super::{ensure_table_ready, RepoError, RepoResult};
use crate::model::cluster::{Cluster, ClusterId, ProvisioningState, SecurityType};
use crate::session::UnitOfWork;
use log::debug;
use rusqlite::{params, Connection, Row};

const CLUSTER_SELECT_SQL: &str = "SELECT
    cluster_id,
    resource_id,
    cluster_info,
    cluster_name,
    provisioning_state,
    security_type
FROM clusters";

const CLUSTER_COLUMNS: &[&str] = &[
    "cluster_id",
    "resource_id",
    "cluster_info",
    "cluster_name",
    "provisioning_state",
    "security_type",
];

/// Repository interface for cluster rows.
pub trait ClusterRepository {
    fn find_by_id(&self, id: ClusterId) -> RepoResult<Option<Cluster>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Cluster>>;
    fn find_by_resource_id(&self, resource_id: i64) -> RepoResult<Option<Cluster>>;
    /// Lists every cluster ordered by id; empty when there are none.
    fn find_all(&self) -> RepoResult<Vec<Cluster>>;
    /// Inserts a new row and returns the managed copy with its id.
    fn create(&self, cluster: &Cluster) -> RepoResult<Cluster>;
    /// Applies `cluster` onto the managed instance; `flush` writes it through
    /// immediately instead of at the next flush point.
    fn merge(&self, cluster: &Cluster, flush: bool) -> RepoResult<Cluster>;
    /// Reloads a managed instance from storage, discarding pending changes.
    fn refresh(&self, cluster: &Cluster) -> RepoResult<Cluster>;
    fn remove(&self, cluster: &Cluster) -> RepoResult<()>;
    fn remove_by_name(&self, name: &str) -> RepoResult<()>;
    fn remove_by_pk(&self, id: ClusterId) -> RepoResult<()>;
    fn is_managed(&self, cluster: &Cluster) -> bool;
}

/// SQLite-backed cluster repository bound to one unit of work.
pub struct SqliteClusterRepository<'a, 'conn> {
    uow: &'a UnitOfWork<'conn>,
}

impl<'a, 'conn> SqliteClusterRepository<'a, 'conn> {
    pub fn try_new(uow: &'a UnitOfWork<'conn>) -> RepoResult<Self> {
        ensure_table_ready(uow.connection(), "clusters", CLUSTER_COLUMNS)?;
        Ok(Self { uow })
    }

    fn conn(&self) -> &Connection {
        self.uow.connection()
    }

    fn load_row(&self, id: ClusterId) -> RepoResult<Option<Cluster>> {
        select_one(
            self.conn(),
            &format!("{CLUSTER_SELECT_SQL} WHERE cluster_id = ?1;"),
            [id],
            parse_cluster_row,
        )
    }

    fn insert_row(&self, cluster: &Cluster) -> RepoResult<Cluster> {
        self.conn().execute(
            "INSERT INTO clusters (
                cluster_id,
                resource_id,
                cluster_info,
                cluster_name,
                provisioning_state,
                security_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                cluster.id,
                cluster.resource_id,
                cluster.cluster_info.as_str(),
                cluster.name.as_str(),
                cluster.provisioning_state.as_db_str(),
                cluster.security_type.as_db_str(),
            ],
        )?;

        let mut persisted = cluster.clone();
        persisted.id = Some(self.conn().last_insert_rowid());
        self.uow.attach_clean(persisted.clone());
        debug!(
            "event=cluster_create module=repo status=ok cluster_id={}",
            persisted.id.unwrap_or_default()
        );
        Ok(persisted)
    }
}

impl ClusterRepository for SqliteClusterRepository<'_, '_> {
    fn find_by_id(&self, id: ClusterId) -> RepoResult<Option<Cluster>> {
        if let Some(managed) = self.uow.managed_cluster(id) {
            return Ok(Some(managed));
        }
        Ok(self
            .load_row(id)?
            .map(|cluster| self.uow.attach_loaded(cluster)))
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Option<Cluster>> {
        self.uow.flush()?;
        let found = select_one(
            self.conn(),
            &format!("{CLUSTER_SELECT_SQL} WHERE cluster_name = ?1;"),
            [name],
            parse_cluster_row,
        )?;
        Ok(found.map(|cluster| self.uow.attach_loaded(cluster)))
    }

    fn find_by_resource_id(&self, resource_id: i64) -> RepoResult<Option<Cluster>> {
        self.uow.flush()?;
        let found = select_one(
            self.conn(),
            &format!("{CLUSTER_SELECT_SQL} WHERE resource_id = ?1;"),
            [resource_id],
            parse_cluster_row,
        )?;
        Ok(found.map(|cluster| self.uow.attach_loaded(cluster)))
    }

    fn find_all(&self) -> RepoResult<Vec<Cluster>> {
        self.uow.flush()?;
        let clusters = select_list(
            self.conn(),
            &format!("{CLUSTER_SELECT_SQL} ORDER BY cluster_id ASC;"),
            [],
            parse_cluster_row,
        )?;
        Ok(clusters
            .into_iter()
            .map(|cluster| self.uow.attach_loaded(cluster))
            .collect())
    }

    fn create(&self, cluster: &Cluster) -> RepoResult<Cluster> {
        cluster.validate()?;
        self.uow.flush()?;
        self.insert_row(cluster)
    }

    fn merge(&self, cluster: &Cluster, flush: bool) -> RepoResult<Cluster> {
        cluster.validate()?;

        let managed = match cluster.id {
            None => self.create(cluster)?,
            Some(id) if self.uow.is_tracking(id) => self.uow.merge_into(cluster.clone()),
            Some(id) => match self.load_row(id)? {
                Some(current) => {
                    self.uow.attach_loaded(current);
                    self.uow.merge_into(cluster.clone())
                }
                None => {
                    self.uow.flush()?;
                    self.insert_row(cluster)?
                }
            },
        };

        if flush {
            self.uow.flush()?;
        }
        Ok(managed)
    }

    fn refresh(&self, cluster: &Cluster) -> RepoResult<Cluster> {
        let id = cluster
            .id
            .ok_or_else(|| RepoError::not_found("cluster", cluster.name.as_str()))?;
        if !self.uow.is_tracking(id) {
            return Err(RepoError::NotManaged(id));
        }

        match self.load_row(id)? {
            Some(current) => {
                self.uow.attach_clean(current.clone());
                Ok(current)
            }
            None => {
                self.uow.detach(id);
                Err(RepoError::not_found("cluster", id))
            }
        }
    }

    fn remove(&self, cluster: &Cluster) -> RepoResult<()> {
        // A detached instance whose row is gone must not be re-inserted by merge.
        if let Some(id) = cluster.id {
            if !self.uow.is_tracking(id) && self.load_row(id)?.is_none() {
                return Err(RepoError::not_found("cluster", id));
            }
        }

        let managed = self.merge(cluster, false)?;
        let id = managed.id.ok_or_else(|| {
            RepoError::InvalidData(format!("merged cluster `{}` has no id", managed.name))
        })?;

        self.uow.detach(id);
        let deleted = execute_update(
            self.conn(),
            "DELETE FROM clusters WHERE cluster_id = ?1;",
            [id],
        )?;
        if deleted == 0 {
            return Err(RepoError::not_found("cluster", id));
        }

        debug!(
            "event=cluster_remove module=repo status=ok cluster_id={}",
            id
        );
        Ok(())
    }

    fn remove_by_name(&self, name: &str) -> RepoResult<()> {
        let cluster = self
            .find_by_name(name)?
            .ok_or_else(|| RepoError::not_found("cluster", name))?;
        self.remove(&cluster)
    }

    fn remove_by_pk(&self, id: ClusterId) -> RepoResult<()> {
        let cluster = self
            .find_by_id(id)?
            .ok_or_else(|| RepoError::not_found("cluster", id))?;
        self.remove(&cluster)
    }

    fn is_managed(&self, cluster: &Cluster) -> bool {
        self.uow.contains(cluster)
    }
}

/// Writes the full state of a managed cluster to its row.
pub(crate) fn write_cluster_row(conn: &Connection, cluster: &Cluster) -> RepoResult<()> {
    let id = cluster
        .id
        .ok_or_else(|| RepoError::not_found("cluster", cluster.name.as_str()))?;
    let changed = conn.execute(
        "UPDATE clusters
         SET
            resource_id = ?1,
            cluster_info = ?2,
            cluster_name = ?3,
            provisioning_state = ?4,
            security_type = ?5
         WHERE cluster_id = ?6;",
        params![
            cluster.resource_id,
            cluster.cluster_info.as_str(),
            cluster.name.as_str(),
            cluster.provisioning_state.as_db_str(),
            cluster.security_type.as_db_str(),
            id,
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::not_found("cluster", id));
    }
    debug!("event=cluster_update module=repo status=ok cluster_id={}", id);
    Ok(())
}

fn parse_cluster_row(row: &Row<'_>) -> RepoResult<Cluster> {
    let state_text: String = row.get("provisioning_state")?;
    let provisioning_state = ProvisioningState::from_db_str(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid provisioning state `{state_text}` in clusters.provisioning_state"
        ))
    })?;

    let security_text: String = row.get("security_type")?;
    let security_type = SecurityType::from_db_str(&security_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid security type `{security_text}` in clusters.security_type"
        ))
    })?;

    Ok(Cluster {
        id: Some(row.get("cluster_id")?),
        name: row.get("cluster_name")?,
        resource_id: row.get("resource_id")?,
        provisioning_state,
        security_type,
        cluster_info: row.get("cluster_info")?,
    })
}
