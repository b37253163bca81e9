//! Catalog queries used to verify what the revisions produced.
//!
//! Postgres answers from `information_schema` and `pg_get_viewdef`, SQLite
//! from `sqlite_master` and `pragma_table_info`.

use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement, Value};

fn unsupported(backend: DbBackend) -> DbErr {
    DbErr::Custom(format!("schema inspection is not supported on {backend:?}"))
}

fn statement(backend: DbBackend, sql: &str, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(backend, sql, values)
}

async fn count<C>(db: &C, stmt: Statement) -> Result<i64, DbErr>
where
    C: ConnectionTrait,
{
    match db.query_one(stmt).await? {
        Some(row) => row.try_get::<i64>("", "n"),
        None => Ok(0),
    }
}

pub async fn table_exists<C>(db: &C, table: &str) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => statement(
            backend,
            "SELECT COUNT(*) AS n FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1 \
             AND table_type = 'BASE TABLE'",
            vec![table.into()],
        ),
        DbBackend::Sqlite => statement(
            backend,
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
            vec![table.into()],
        ),
        other => return Err(unsupported(other)),
    };
    Ok(count(db, stmt).await? > 0)
}

pub async fn view_exists<C>(db: &C, view: &str) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => statement(
            backend,
            "SELECT COUNT(*) AS n FROM information_schema.views \
             WHERE table_schema = current_schema() AND table_name = $1",
            vec![view.into()],
        ),
        DbBackend::Sqlite => statement(
            backend,
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'view' AND name = ?",
            vec![view.into()],
        ),
        other => return Err(unsupported(other)),
    };
    Ok(count(db, stmt).await? > 0)
}

/// Column names of a table or view in declaration order. Empty when the
/// relation does not exist.
pub async fn columns<C>(db: &C, relation: &str) -> Result<Vec<String>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => statement(
            backend,
            "SELECT column_name::text AS name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
            vec![relation.into()],
        ),
        DbBackend::Sqlite => statement(
            backend,
            "SELECT name FROM pragma_table_info(?) ORDER BY cid",
            vec![relation.into()],
        ),
        other => return Err(unsupported(other)),
    };
    db.query_all(stmt)
        .await?
        .iter()
        .map(|row| row.try_get::<String>("", "name"))
        .collect()
}

/// Names of the indexes defined on `table`.
pub async fn indexes<C>(db: &C, table: &str) -> Result<Vec<String>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => statement(
            backend,
            "SELECT indexname::text AS name FROM pg_indexes \
             WHERE schemaname = current_schema() AND tablename = $1 ORDER BY indexname",
            vec![table.into()],
        ),
        DbBackend::Sqlite => statement(
            backend,
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ? \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
            vec![table.into()],
        ),
        other => return Err(unsupported(other)),
    };
    db.query_all(stmt)
        .await?
        .iter()
        .map(|row| row.try_get::<String>("", "name"))
        .collect()
}

/// The definition the database stores for `view`.
///
/// Postgres returns its own normalised query text; SQLite returns the full
/// `CREATE VIEW` statement as it was issued.
pub async fn view_sql<C>(db: &C, view: &str) -> Result<Option<String>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => statement(
            backend,
            "SELECT pg_get_viewdef(c.oid, true) AS definition FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind = 'v' AND n.nspname = current_schema() AND c.relname = $1",
            vec![view.into()],
        ),
        DbBackend::Sqlite => statement(
            backend,
            "SELECT sql AS definition FROM sqlite_master WHERE type = 'view' AND name = ?",
            vec![view.into()],
        ),
        other => return Err(unsupported(other)),
    };
    match db.query_one(stmt).await? {
        Some(row) => row.try_get::<Option<String>>("", "definition"),
        None => Ok(None),
    }
}
