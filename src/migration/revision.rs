use std::collections::HashSet;

use sea_orm::DbErr;

/// Identity of one schema change and the change it builds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub id: &'static str,
    /// `None` only for the first revision.
    pub down_revision: Option<&'static str>,
    pub message: &'static str,
}

/// Checks that `revisions` form one linear chain in the given order.
pub fn validate_chain(revisions: &[Revision]) -> Result<(), DbErr> {
    let Some(first) = revisions.first() else {
        return Err(DbErr::Migration("revision chain is empty".into()));
    };
    if let Some(parent) = first.down_revision {
        return Err(DbErr::Migration(format!(
            "first revision {} must not have a predecessor, found {parent}",
            first.id
        )));
    }

    let mut seen = HashSet::with_capacity(revisions.len());
    for revision in revisions {
        if !seen.insert(revision.id) {
            return Err(DbErr::Migration(format!(
                "duplicate revision id {}",
                revision.id
            )));
        }
    }

    for pair in revisions.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.down_revision != Some(prev.id) {
            return Err(DbErr::Migration(format!(
                "revision {} revises {}, expected {}",
                next.id,
                next.down_revision.unwrap_or("<none>"),
                prev.id
            )));
        }
    }
    Ok(())
}
