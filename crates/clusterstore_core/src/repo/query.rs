//! Query execution adapters shared by repositories.
//!
//! # Invariants
//! - `select_one` never fails on an empty result; it yields `None` and
//!   returns the first row when several match.
//! - `select_single` is for aggregates that always produce exactly one row.

use super::RepoResult;
use rusqlite::types::FromSql;
use rusqlite::{Connection, Params, Row};

/// Runs `sql` and maps the first row, if any.
pub fn select_one<T, P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    mut map: F,
) -> RepoResult<Option<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> RepoResult<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map(row)?)),
        None => Ok(None),
    }
}

/// Runs `sql` and maps every row in result order.
pub fn select_list<T, P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    mut map: F,
) -> RepoResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> RepoResult<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(map(row)?);
    }
    Ok(items)
}

/// Reads the first column of the single row produced by `sql`.
pub fn select_single<T, P>(conn: &Connection, sql: &str, params: P) -> RepoResult<T>
where
    T: FromSql,
    P: Params,
{
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

/// Executes a DML statement and returns the number of affected rows.
pub fn execute_update<P: Params>(conn: &Connection, sql: &str, params: P) -> RepoResult<usize> {
    Ok(conn.execute(sql, params)?)
}

/// Builds `?first, ?first+1, ...` for an IN-list of `count` values.
pub fn numbered_placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
