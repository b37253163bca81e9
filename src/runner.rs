//! Applying and reverting the revision chain.
//!
//! Revisions are run one at a time, each inside its own transaction. A
//! failing revision leaves the schema at the last revision that completed.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, TransactionTrait};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migration::{Migrator, Revision, validate_chain};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionStatus {
    pub revision: Revision,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Runs exactly one revision step in a transaction.
///
/// sea-orm-migration opens the transaction itself on Postgres only, so other
/// backends get one here.
async fn step(db: &DatabaseConnection, direction: Direction) -> Result<(), DbErr> {
    if db.get_database_backend() == DbBackend::Postgres {
        return match direction {
            Direction::Up => Migrator::up(db, Some(1)).await,
            Direction::Down => Migrator::down(db, Some(1)).await,
        };
    }

    let txn = db.begin().await?;
    match direction {
        Direction::Up => Migrator::up(&txn, Some(1)).await?,
        Direction::Down => Migrator::down(&txn, Some(1)).await?,
    }
    txn.commit().await
}

fn lookup(name: &str) -> Result<Revision, DbErr> {
    Migrator::revision_named(name)
        .ok_or_else(|| DbErr::Migration(format!("database records unknown migration {name}")))
}

/// Applies every pending revision, oldest first.
pub async fn upgrade_to_head(db: &DatabaseConnection) -> Result<Vec<Revision>, DbErr> {
    upgrade(db, None).await
}

/// Applies up to `steps` pending revisions, or all of them for `None`.
pub async fn upgrade(db: &DatabaseConnection, steps: Option<u32>) -> Result<Vec<Revision>, DbErr> {
    validate_chain(&Migrator::revisions())?;

    let pending = Migrator::get_pending_migrations(db).await?;
    let limit = steps.map_or(pending.len(), |n| n as usize);
    if pending.is_empty() || limit == 0 {
        info!("nothing to upgrade");
        return Ok(Vec::new());
    }

    let mut applied = Vec::with_capacity(limit.min(pending.len()));
    for migration in pending.iter().take(limit) {
        let revision = lookup(migration.name())?;
        info!(
            revision = revision.id,
            down_revision = revision.down_revision.unwrap_or("<base>"),
            message = revision.message,
            "running upgrade"
        );
        step(db, Direction::Up).await?;
        applied.push(revision);
    }
    Ok(applied)
}

/// Reverts the `steps` most recently applied revisions, newest first.
///
/// Asking for more steps than are applied reverts everything.
pub async fn downgrade(db: &DatabaseConnection, steps: u32) -> Result<Vec<Revision>, DbErr> {
    if steps == 0 {
        return Ok(Vec::new());
    }

    let applied = Migrator::get_applied_migrations(db).await?;
    let targets = applied
        .iter()
        .rev()
        .take(steps as usize)
        .map(|migration| lookup(migration.name()))
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        info!("nothing to downgrade");
    }

    for revision in &targets {
        info!(
            revision = revision.id,
            down_revision = revision.down_revision.unwrap_or("<base>"),
            message = revision.message,
            "running downgrade"
        );
        step(db, Direction::Down).await?;
    }
    Ok(targets)
}

/// Reverts every applied revision.
pub async fn downgrade_to_base(db: &DatabaseConnection) -> Result<Vec<Revision>, DbErr> {
    downgrade(db, u32::MAX).await
}

/// The most recently applied revision.
pub async fn current(db: &DatabaseConnection) -> Result<Option<Revision>, DbErr> {
    let applied = Migrator::get_applied_migrations(db).await?;
    applied.last().map(|migration| lookup(migration.name())).transpose()
}

pub fn history() -> Vec<Revision> {
    Migrator::revisions()
}

pub async fn status(db: &DatabaseConnection) -> Result<Vec<RevisionStatus>, DbErr> {
    let migrations = Migrator::get_applied_migrations(db).await?;
    let names: Vec<&str> = migrations.iter().map(|m| m.name()).collect();
    Ok(Migrator::revisions()
        .into_iter()
        .map(|revision| {
            let applied = Migrator::migration_name(revision.id)
                .is_some_and(|name| names.contains(&name.as_str()));
            RevisionStatus { revision, applied }
        })
        .collect())
}
