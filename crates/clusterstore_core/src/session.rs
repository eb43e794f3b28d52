//! Explicit unit of work shared by all repositories.
//!
//! # Responsibility
//! - Own the SQLite transaction that scopes a batch of repository calls.
//! - Track managed clusters in an identity map and defer their merged
//!   changes until the next flush.
//!
//! # Invariants
//! - Repository queries and inserts flush pending changes first, so every
//!   repository borrowing the same unit of work sees the same state.
//! - `commit` flushes before committing; dropping without `commit` rolls back.
//! - A cluster is managed iff its id is in the identity map.

use crate::model::cluster::{Cluster, ClusterId};
use crate::repo::cluster_repo::write_cluster_row;
use crate::repo::RepoResult;
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug)]
struct ManagedCluster {
    cluster: Cluster,
    dirty: bool,
}

/// Transaction handle plus the identity map of managed clusters.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    managed: RefCell<BTreeMap<ClusterId, ManagedCluster>>,
    started_at: Instant,
}

impl<'conn> UnitOfWork<'conn> {
    /// Starts an immediate (write-locking) transaction on `conn`.
    pub fn begin(conn: &'conn mut Connection) -> RepoResult<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        debug!("event=uow_begin module=session status=ok");
        Ok(Self {
            tx,
            managed: RefCell::new(BTreeMap::new()),
            started_at: Instant::now(),
        })
    }

    /// Connection bound to this unit of work's transaction.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Returns whether the identity map tracks `cluster`.
    pub fn contains(&self, cluster: &Cluster) -> bool {
        cluster
            .id
            .is_some_and(|id| self.managed.borrow().contains_key(&id))
    }

    pub fn managed_count(&self) -> usize {
        self.managed.borrow().len()
    }

    /// Returns whether merged changes are waiting for a flush.
    pub fn has_pending_changes(&self) -> bool {
        self.managed.borrow().values().any(|entry| entry.dirty)
    }

    /// Writes every pending cluster change and returns how many rows it wrote.
    pub fn flush(&self) -> RepoResult<usize> {
        let pending: Vec<Cluster> = self
            .managed
            .borrow()
            .values()
            .filter(|entry| entry.dirty)
            .map(|entry| entry.cluster.clone())
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        for cluster in &pending {
            write_cluster_row(self.connection(), cluster)?;
        }

        let mut managed = self.managed.borrow_mut();
        for id in pending.iter().filter_map(|cluster| cluster.id) {
            if let Some(entry) = managed.get_mut(&id) {
                entry.dirty = false;
            }
        }
        debug!(
            "event=uow_flush module=session status=ok rows={}",
            pending.len()
        );
        Ok(pending.len())
    }

    /// Flushes and commits all work done through this handle.
    pub fn commit(self) -> RepoResult<()> {
        let flushed = match self.flush() {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "event=uow_commit module=session status=error stage=flush error={}",
                    err
                );
                return Err(err);
            }
        };
        let managed = self.managed_count();
        let duration_ms = self.started_at.elapsed().as_millis();
        self.tx.commit()?;
        info!(
            "event=uow_commit module=session status=ok flushed={} managed={} duration_ms={}",
            flushed, managed, duration_ms
        );
        Ok(())
    }

    /// Discards all work done through this handle, pending merges included.
    pub fn rollback(self) -> RepoResult<()> {
        let discarded = self
            .managed
            .borrow()
            .values()
            .filter(|entry| entry.dirty)
            .count();
        self.tx.rollback()?;
        info!(
            "event=uow_rollback module=session status=ok discarded={}",
            discarded
        );
        Ok(())
    }

    pub(crate) fn managed_cluster(&self, id: ClusterId) -> Option<Cluster> {
        self.managed
            .borrow()
            .get(&id)
            .map(|entry| entry.cluster.clone())
    }

    pub(crate) fn is_tracking(&self, id: ClusterId) -> bool {
        self.managed.borrow().contains_key(&id)
    }

    /// Registers a row read from storage, keeping an existing managed copy.
    pub(crate) fn attach_loaded(&self, cluster: Cluster) -> Cluster {
        let Some(id) = cluster.id else {
            return cluster;
        };
        self.managed
            .borrow_mut()
            .entry(id)
            .or_insert(ManagedCluster {
                cluster,
                dirty: false,
            })
            .cluster
            .clone()
    }

    /// Replaces the managed copy with a value that matches storage.
    pub(crate) fn attach_clean(&self, cluster: Cluster) {
        if let Some(id) = cluster.id {
            self.managed.borrow_mut().insert(
                id,
                ManagedCluster {
                    cluster,
                    dirty: false,
                },
            );
        }
    }

    /// Copies `cluster` onto its managed copy and marks it for the next flush.
    pub(crate) fn merge_into(&self, cluster: Cluster) -> Cluster {
        let Some(id) = cluster.id else {
            return cluster;
        };
        let mut managed = self.managed.borrow_mut();
        match managed.get_mut(&id) {
            Some(entry) => {
                if entry.cluster != cluster {
                    entry.cluster = cluster;
                    entry.dirty = true;
                }
                entry.cluster.clone()
            }
            None => {
                managed.insert(
                    id,
                    ManagedCluster {
                        cluster: cluster.clone(),
                        dirty: true,
                    },
                );
                cluster
            }
        }
    }

    pub(crate) fn detach(&self, id: ClusterId) {
        self.managed.borrow_mut().remove(&id);
    }
}
