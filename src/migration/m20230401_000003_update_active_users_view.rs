use sea_orm_migration::prelude::*;

use super::Revision;
use crate::views::{self, ACTIVE_USERS_V1, ACTIVE_USERS_V2};

pub const REVISION: Revision = Revision {
    id: "9fc4d2e0b71c",
    down_revision: Some("7da1fc2d9e1a"),
    message: "update active users view",
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        views::replace_view(manager, &ACTIVE_USERS_V1, &ACTIVE_USERS_V2).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        views::replace_view(manager, &ACTIVE_USERS_V2, &ACTIVE_USERS_V1).await
    }
}
