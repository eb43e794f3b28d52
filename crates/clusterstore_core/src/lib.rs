//! Data access for managed clusters and their versioned configurations.
//!
//! Callers open a connection with [`db::open_db`], start a [`UnitOfWork`],
//! build repositories over it and commit when done.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;

pub use db::{open_db, open_db_in_memory, open_db_with_options, DbError, DbOptions};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::cluster::{Cluster, ClusterId, ProvisioningState, SecurityType};
pub use model::config::{ClusterConfig, ClusterConfigMapping, ConfigId, DEFAULT_MAPPING_USER};
pub use model::stack::{Stack, StackId, StackPk};
pub use model::ModelValidationError;
pub use repo::cluster_repo::{ClusterRepository, SqliteClusterRepository};
pub use repo::config_repo::{ClusterConfigRepository, SqliteClusterConfigRepository};
pub use repo::mapping_repo::{ConfigMappingRepository, SqliteConfigMappingRepository};
pub use repo::stack_repo::{SqliteStackRepository, StackRepository};
pub use repo::{RepoError, RepoResult};
pub use service::config_service::{ConfigProperties, ConfigService};
pub use session::UnitOfWork;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
