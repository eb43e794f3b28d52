use clusterstore_core::db::open_db_in_memory;
use clusterstore_core::{
    Cluster, ClusterRepository, ModelValidationError, ProvisioningState, RepoError,
    SecurityType, SqliteClusterRepository, UnitOfWork,
};

#[test]
fn create_and_find_by_id_roundtrip() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let mut cluster = Cluster::new("c1", 4);
    cluster.security_type = SecurityType::Kerberos;
    cluster.cluster_info = "primary".to_string();
    let created = repo.create(&cluster).unwrap();

    assert_eq!(created.id, Some(1));
    let loaded = repo.find_by_id(1).unwrap().unwrap();
    assert_eq!(loaded, Cluster { id: Some(1), ..cluster });
}

#[test]
fn created_rows_are_visible_after_commit() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let created = SqliteClusterRepository::try_new(&uow)
        .unwrap()
        .create(&Cluster::new("c1", 4))
        .unwrap();
    uow.commit().unwrap();

    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    assert!(!repo.is_managed(&created));
    assert_eq!(repo.find_by_id(created.id.unwrap()).unwrap(), Some(created));
}

#[test]
fn lookups_by_name_and_resource_id() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let c1 = repo.create(&Cluster::new("c1", 10)).unwrap();
    let c2 = repo.create(&Cluster::new("c2", 20)).unwrap();

    assert_eq!(repo.find_by_name("c2").unwrap(), Some(c2));
    assert_eq!(repo.find_by_resource_id(10).unwrap(), Some(c1));
}

#[test]
fn unknown_keys_return_none() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    repo.create(&Cluster::new("c1", 10)).unwrap();

    assert_eq!(repo.find_by_id(99).unwrap(), None);
    assert_eq!(repo.find_by_name("missing").unwrap(), None);
    assert_eq!(repo.find_by_resource_id(99).unwrap(), None);
}

#[test]
fn find_all_returns_empty_collection_without_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    assert!(repo.find_all().unwrap().is_empty());

    repo.create(&Cluster::new("b", 2)).unwrap();
    repo.create(&Cluster::new("a", 1)).unwrap();
    let names: Vec<String> = repo
        .find_all()
        .unwrap()
        .into_iter()
        .map(|cluster| cluster.name)
        .collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn duplicate_name_propagates_storage_error() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    repo.create(&Cluster::new("c1", 1)).unwrap();
    let err = repo.create(&Cluster::new("c1", 2)).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn validation_failure_blocks_create_and_merge() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let err = repo.create(&Cluster::new("", 1)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ModelValidationError::EmptyClusterName)
    ));

    let mut created = repo.create(&Cluster::new("c1", 1)).unwrap();
    created.name = " ".to_string();
    assert!(matches!(
        repo.merge(&created, true).unwrap_err(),
        RepoError::Validation(_)
    ));
}

#[test]
fn merge_updates_managed_copy_and_flush_writes_through() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let mut cluster = repo.create(&Cluster::new("c1", 1)).unwrap();
    cluster.provisioning_state = ProvisioningState::Installed;

    let managed = repo.merge(&cluster, false).unwrap();
    assert_eq!(managed.provisioning_state, ProvisioningState::Installed);
    assert!(uow.has_pending_changes());
    assert_eq!(stored_state(&uow, 1), "INIT");

    cluster.name = "c1-renamed".to_string();
    repo.merge(&cluster, true).unwrap();
    assert!(!uow.has_pending_changes());
    assert_eq!(stored_state(&uow, 1), "INSTALLED");
    assert_eq!(repo.find_by_name("c1-renamed").unwrap().unwrap().id, Some(1));
}

#[test]
fn queries_see_pending_merges() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let mut cluster = repo.create(&Cluster::new("c1", 1)).unwrap();
    cluster.name = "renamed".to_string();
    repo.merge(&cluster, false).unwrap();

    assert_eq!(repo.find_by_name("c1").unwrap(), None);
    assert_eq!(repo.find_by_name("renamed").unwrap().unwrap().id, Some(1));
}

#[test]
fn merge_of_unsaved_cluster_inserts_it() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let managed = repo.merge(&Cluster::new("fresh", 3), false).unwrap();
    assert!(managed.id.is_some());
    assert!(repo.is_managed(&managed));
    assert_eq!(repo.find_by_name("fresh").unwrap(), Some(managed));
}

#[test]
fn refresh_discards_pending_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let created = repo.create(&Cluster::new("c1", 1)).unwrap();
    let mut edited = created.clone();
    edited.cluster_info = "edited".to_string();
    repo.merge(&edited, false).unwrap();

    let refreshed = repo.refresh(&edited).unwrap();
    assert_eq!(refreshed, created);
    assert!(!uow.has_pending_changes());
    assert_eq!(repo.find_by_id(1).unwrap(), Some(created));
}

#[test]
fn refresh_requires_managed_instance() {
    let mut conn = open_db_in_memory().unwrap();
    let detached = {
        let uow = UnitOfWork::begin(&mut conn).unwrap();
        let created = SqliteClusterRepository::try_new(&uow)
            .unwrap()
            .create(&Cluster::new("c1", 1))
            .unwrap();
        uow.commit().unwrap();
        created
    };

    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    assert!(matches!(
        repo.refresh(&detached).unwrap_err(),
        RepoError::NotManaged(1)
    ));
}

#[test]
fn remove_detached_cluster_merges_first() {
    let mut conn = open_db_in_memory().unwrap();
    let detached = {
        let uow = UnitOfWork::begin(&mut conn).unwrap();
        let created = SqliteClusterRepository::try_new(&uow)
            .unwrap()
            .create(&Cluster::new("c1", 1))
            .unwrap();
        uow.commit().unwrap();
        created
    };

    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    assert!(!repo.is_managed(&detached));

    repo.remove(&detached).unwrap();
    assert!(!repo.is_managed(&detached));
    assert_eq!(repo.find_by_id(1).unwrap(), None);
    uow.commit().unwrap();

    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    assert!(repo.find_all().unwrap().is_empty());
}

#[test]
fn remove_by_name_and_pk() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();

    let c1 = repo.create(&Cluster::new("c1", 1)).unwrap();
    repo.create(&Cluster::new("c2", 2)).unwrap();

    repo.remove_by_name("c2").unwrap();
    repo.remove_by_pk(c1.id.unwrap()).unwrap();
    assert!(repo.find_all().unwrap().is_empty());

    assert!(matches!(
        repo.remove_by_name("c2").unwrap_err(),
        RepoError::NotFound { entity: "cluster", .. }
    ));
    assert!(matches!(
        repo.remove_by_pk(42).unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn remove_of_stale_detached_cluster_reports_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let stale = {
        let uow = UnitOfWork::begin(&mut conn).unwrap();
        let repo = SqliteClusterRepository::try_new(&uow).unwrap();
        let created = repo.create(&Cluster::new("c1", 1)).unwrap();
        repo.remove(&created).unwrap();
        repo.create(&Cluster::new("c1", 1)).unwrap();
        uow.commit().unwrap();
        created
    };

    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    let err = repo.remove(&stale).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "cluster", .. }));

    let remaining = repo.find_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "c1");
    assert_ne!(remaining[0].id, stale.id);
}

#[test]
fn rollback_discards_created_clusters() {
    let mut conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::begin(&mut conn).unwrap();
    SqliteClusterRepository::try_new(&uow)
        .unwrap()
        .create(&Cluster::new("c1", 1))
        .unwrap();
    uow.rollback().unwrap();

    let uow = UnitOfWork::begin(&mut conn).unwrap();
    let repo = SqliteClusterRepository::try_new(&uow).unwrap();
    assert!(repo.find_all().unwrap().is_empty());
}

fn stored_state(uow: &UnitOfWork<'_>, id: i64) -> String {
    uow.connection()
        .query_row(
            "SELECT provisioning_state FROM clusters WHERE cluster_id = ?1;",
            [id],
            |row| row.get(0),
        )
        .unwrap()
}
