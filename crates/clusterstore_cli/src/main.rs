//! CLI smoke entry point.
//!
//! Usage: `clusterstore_cli [db-path]`. Logging goes to
//! `$CLUSTERSTORE_LOG_DIR` at `$CLUSTERSTORE_LOG_LEVEL` when the directory is set.

use clusterstore_core::{
    default_log_level, init_logging, open_db, ClusterRepository, ConfigMappingRepository,
    LoggingConfig, RepoError, SqliteClusterRepository, SqliteConfigMappingRepository,
    UnitOfWork,
};
use log::error;
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("clusterstore_core ping={}", clusterstore_core::ping());
    println!("clusterstore_core version={}", clusterstore_core::core_version());

    if let Ok(log_dir) = env::var("CLUSTERSTORE_LOG_DIR") {
        let level =
            env::var("CLUSTERSTORE_LOG_LEVEL").unwrap_or_else(|_| default_log_level().to_string());
        if let Err(err) = init_logging(&LoggingConfig::new(level, log_dir)) {
            eprintln!("logging disabled: {err}");
        }
    }

    let Some(db_path) = env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match print_cluster_summary(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_summary module=cli status=error error={}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_cluster_summary(db_path: &str) -> Result<(), RepoError> {
    let mut conn = open_db(db_path)?;
    let uow = UnitOfWork::begin(&mut conn)?;
    {
        let clusters = SqliteClusterRepository::try_new(&uow)?;
        let mappings = SqliteConfigMappingRepository::try_new(&uow)?;

        let all = clusters.find_all()?;
        println!("clusters={}", all.len());
        for cluster in all {
            let Some(id) = cluster.id else {
                continue;
            };
            let mapping_count = mappings
                .get_cluster_config_mapping_entities_by_cluster(id)?
                .len();
            println!(
                "cluster id={} name={} state={} mappings={}",
                id,
                cluster.name,
                cluster.provisioning_state.as_db_str(),
                mapping_count
            );
        }
    }
    uow.rollback()
}
