//! The revision chain.
//!
//! Each revision module exports its [`Revision`] metadata as `REVISION` and a
//! sea-orm `Migration`. [`chain`] is the only place the order is written
//! down; both the migrator and the revision lookups read it.

use sea_orm_migration::prelude::*;

mod revision;

pub use revision::{Revision, validate_chain};

mod m20230401_000001_create_tables;
mod m20230401_000002_create_active_users_view;
mod m20230401_000003_update_active_users_view;

macro_rules! revision {
    ($module:ident) => {
        (
            $module::REVISION,
            Box::new($module::Migration) as Box<dyn MigrationTrait>,
        )
    };
}

fn chain() -> Vec<(Revision, Box<dyn MigrationTrait>)> {
    vec![
        revision!(m20230401_000001_create_tables),
        revision!(m20230401_000002_create_active_users_view),
        revision!(m20230401_000003_update_active_users_view),
    ]
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        chain().into_iter().map(|(_, migration)| migration).collect()
    }
}

impl Migrator {
    /// All revisions, oldest first.
    pub fn revisions() -> Vec<Revision> {
        chain().into_iter().map(|(revision, _)| revision).collect()
    }

    pub fn head() -> Option<Revision> {
        Self::revisions().last().copied()
    }

    /// Maps a sea-orm migration name back to its revision.
    pub fn revision_named(name: &str) -> Option<Revision> {
        chain()
            .into_iter()
            .find(|(_, migration)| migration.name() == name)
            .map(|(revision, _)| revision)
    }

    pub fn migration_name(id: &str) -> Option<String> {
        chain()
            .into_iter()
            .find(|(revision, _)| revision.id == id)
            .map(|(_, migration)| migration.name().to_string())
    }
}
