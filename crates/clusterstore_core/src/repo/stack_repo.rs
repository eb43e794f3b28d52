//! Stack lookup repository.

use super::query::{select_list, select_one};
use super::{ensure_table_ready, RepoResult};
use crate::model::stack::{Stack, StackId, StackPk};
use crate::session::UnitOfWork;
use log::debug;
use rusqlite::{params, Row};

const STACK_SELECT_SQL: &str = "SELECT stack_id, stack_name, stack_version FROM stack";

/// Repository interface for stack rows.
pub trait StackRepository {
    fn find(&self, name: &str, version: &str) -> RepoResult<Option<Stack>>;
    fn find_by_id(&self, pk: StackPk) -> RepoResult<Option<Stack>>;
    fn find_all(&self) -> RepoResult<Vec<Stack>>;
    fn create(&self, stack_id: &StackId) -> RepoResult<Stack>;

    /// Resolves a name/version pair to its stored row.
    fn resolve(&self, stack_id: &StackId) -> RepoResult<Option<Stack>> {
        self.find(&stack_id.name, &stack_id.version)
    }
}

pub struct SqliteStackRepository<'a, 'conn> {
    uow: &'a UnitOfWork<'conn>,
}

impl<'a, 'conn> SqliteStackRepository<'a, 'conn> {
    pub fn try_new(uow: &'a UnitOfWork<'conn>) -> RepoResult<Self> {
        ensure_table_ready(
            uow.connection(),
            "stack",
            &["stack_id", "stack_name", "stack_version"],
        )?;
        Ok(Self { uow })
    }
}

impl StackRepository for SqliteStackRepository<'_, '_> {
    fn find(&self, name: &str, version: &str) -> RepoResult<Option<Stack>> {
        select_one(
            self.uow.connection(),
            &format!("{STACK_SELECT_SQL} WHERE stack_name = ?1 AND stack_version = ?2;"),
            params![name, version],
            parse_stack_row,
        )
    }

    fn find_by_id(&self, pk: StackPk) -> RepoResult<Option<Stack>> {
        select_one(
            self.uow.connection(),
            &format!("{STACK_SELECT_SQL} WHERE stack_id = ?1;"),
            [pk],
            parse_stack_row,
        )
    }

    fn find_all(&self) -> RepoResult<Vec<Stack>> {
        select_list(
            self.uow.connection(),
            &format!("{STACK_SELECT_SQL} ORDER BY stack_name ASC, stack_version ASC;"),
            [],
            parse_stack_row,
        )
    }

    fn create(&self, stack_id: &StackId) -> RepoResult<Stack> {
        stack_id.validate()?;
        let conn = self.uow.connection();
        conn.execute(
            "INSERT INTO stack (stack_name, stack_version) VALUES (?1, ?2);",
            params![stack_id.name.as_str(), stack_id.version.as_str()],
        )?;
        let stack = Stack {
            pk: conn.last_insert_rowid(),
            name: stack_id.name.clone(),
            version: stack_id.version.clone(),
        };
        debug!(
            "event=stack_create module=repo status=ok stack={} stack_pk={}",
            stack_id, stack.pk
        );
        Ok(stack)
    }
}

fn parse_stack_row(row: &Row<'_>) -> RepoResult<Stack> {
    Ok(Stack {
        pk: row.get("stack_id")?,
        name: row.get("stack_name")?,
        version: row.get("stack_version")?,
    })
}
