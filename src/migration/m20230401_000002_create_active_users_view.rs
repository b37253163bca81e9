use sea_orm_migration::prelude::*;

use super::Revision;
use crate::views::{self, ACTIVE_USERS_V1};

pub const REVISION: Revision = Revision {
    id: "7da1fc2d9e1a",
    down_revision: Some("6da1fc2d9e1a"),
    message: "create active users view",
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        views::create_view(manager, &ACTIVE_USERS_V1).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        views::drop_view(manager, &ACTIVE_USERS_V1).await
    }
}
