//! View definitions and the DDL used to install them.
//!
//! Every version of a view is a [`ViewDefinition`] constant. Revisions refer
//! to the versions they install, and [`registered`] lists the latest version
//! of each view so drift against the database can be detected.

use sea_orm::{ConnectionTrait, DbBackend, DbErr};
use sea_orm_migration::SchemaManager;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: &'static str,
    /// Output columns, in the order the query produces them.
    pub columns: &'static [&'static str],
    pub select: &'static str,
}

/// Users with at least one post and how many posts they wrote.
pub const ACTIVE_USERS_V1: ViewDefinition = ViewDefinition {
    name: "active_users",
    columns: &["id", "username", "email", "post_count"],
    select: "SELECT u.id, u.username, u.email, COUNT(p.id) AS post_count
FROM users u
JOIN posts p ON u.id = p.user_id
GROUP BY u.id, u.username, u.email
HAVING COUNT(p.id) > 0",
};

/// Adds `last_post_date`, the newest `posts.created_at` per user.
pub const ACTIVE_USERS_V2: ViewDefinition = ViewDefinition {
    name: "active_users",
    columns: &["id", "username", "email", "post_count", "last_post_date"],
    select: "SELECT u.id, u.username, u.email, COUNT(p.id) AS post_count,
       MAX(p.created_at) AS last_post_date
FROM users u
JOIN posts p ON u.id = p.user_id
GROUP BY u.id, u.username, u.email
HAVING COUNT(p.id) > 0",
};

pub const ACTIVE_USERS: ViewDefinition = ACTIVE_USERS_V2;

/// Views tracked by revision autogeneration, at their current version.
pub fn registered() -> Vec<ViewDefinition> {
    vec![ACTIVE_USERS]
}

impl ViewDefinition {
    pub fn create_sql(&self) -> String {
        format!("CREATE VIEW {} AS\n{}", self.name, self.select.trim())
    }

    pub fn drop_sql(&self) -> String {
        drop_sql(self.name)
    }

    /// True when this version keeps every column of `previous` in place and
    /// only appends new ones.
    pub fn extends(&self, previous: &ViewDefinition) -> bool {
        self.columns.starts_with(previous.columns)
    }

    /// Statements that turn `previous` into this version on `backend`.
    ///
    /// Postgres can only append columns with `CREATE OR REPLACE VIEW`, so
    /// any other change drops and recreates the view. SQLite has no
    /// `OR REPLACE` for views at all.
    pub fn replace_sql(&self, backend: DbBackend, previous: &ViewDefinition) -> Vec<String> {
        match backend {
            DbBackend::Postgres if self.extends(previous) => vec![format!(
                "CREATE OR REPLACE VIEW {} AS\n{}",
                self.name,
                self.select.trim()
            )],
            _ => vec![drop_sql(previous.name), self.create_sql()],
        }
    }
}

fn drop_sql(name: &str) -> String {
    format!("DROP VIEW IF EXISTS {name}")
}

pub async fn create_view(manager: &SchemaManager<'_>, view: &ViewDefinition) -> Result<(), DbErr> {
    execute_all(manager, &[view.create_sql()]).await
}

pub async fn drop_view(manager: &SchemaManager<'_>, view: &ViewDefinition) -> Result<(), DbErr> {
    execute_all(manager, &[view.drop_sql()]).await
}

/// Replaces the installed `from` version of a view with `to`.
pub async fn replace_view(
    manager: &SchemaManager<'_>,
    from: &ViewDefinition,
    to: &ViewDefinition,
) -> Result<(), DbErr> {
    let statements = to.replace_sql(manager.get_database_backend(), from);
    execute_all(manager, &statements).await
}

async fn execute_all(manager: &SchemaManager<'_>, statements: &[String]) -> Result<(), DbErr> {
    let conn = manager.get_connection();
    for sql in statements {
        debug!(%sql, "executing view ddl");
        conn.execute_unprepared(sql).await?;
    }
    Ok(())
}

/// Extracts the query from a stored `CREATE VIEW <name> AS <query>` text.
pub fn select_from_create(sql: &str) -> Option<&str> {
    let lower = sql.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    lower.match_indices("as").find_map(|(pos, _)| {
        let before = pos.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(pos + 2).copied();
        let bounded = matches!(before, Some(b) if b.is_ascii_whitespace())
            && matches!(after, Some(b) if b.is_ascii_whitespace() || b == b'(');
        bounded.then(|| sql[pos + 2..].trim().trim_end_matches(';').trim_end())
    })
}

/// Lowercases and collapses whitespace so stored and declared SQL compare
/// equal regardless of formatting.
pub fn normalize_sql(sql: &str) -> String {
    sql.trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_version_is_registered() {
        assert_eq!(registered(), vec![ACTIVE_USERS_V2]);
    }

    #[test]
    fn v2_extends_v1_but_not_the_reverse() {
        assert!(ACTIVE_USERS_V2.extends(&ACTIVE_USERS_V1));
        assert!(!ACTIVE_USERS_V1.extends(&ACTIVE_USERS_V2));
    }

    #[test]
    fn postgres_appends_columns_in_place() {
        let sql = ACTIVE_USERS_V2.replace_sql(DbBackend::Postgres, &ACTIVE_USERS_V1);
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("CREATE OR REPLACE VIEW active_users AS"));
        assert!(sql[0].contains("MAX(p.created_at) AS last_post_date"));
    }

    #[test]
    fn postgres_recreates_when_columns_are_removed() {
        let sql = ACTIVE_USERS_V1.replace_sql(DbBackend::Postgres, &ACTIVE_USERS_V2);
        assert_eq!(
            sql,
            vec![
                "DROP VIEW IF EXISTS active_users".to_string(),
                ACTIVE_USERS_V1.create_sql(),
            ]
        );
    }

    #[test]
    fn sqlite_always_recreates() {
        let sql = ACTIVE_USERS_V2.replace_sql(DbBackend::Sqlite, &ACTIVE_USERS_V1);
        assert_eq!(sql[0], "DROP VIEW IF EXISTS active_users");
        assert_eq!(sql[1], ACTIVE_USERS_V2.create_sql());
    }

    #[test]
    fn select_is_recovered_from_create_text() {
        let stored = ACTIVE_USERS_V1.create_sql();
        assert_eq!(select_from_create(&stored), Some(ACTIVE_USERS_V1.select));
    }

    #[test]
    fn select_extraction_skips_as_inside_names() {
        let stored = "create view base_stats as (select 1 as n);";
        assert_eq!(select_from_create(stored), Some("(select 1 as n)"));
        assert_eq!(select_from_create("create view nothing"), None);
    }

    #[test]
    fn normalization_ignores_layout_and_case() {
        assert_eq!(
            normalize_sql("SELECT  a,\n   b\tFROM t;"),
            normalize_sql("select a, b from t")
        );
    }
}
