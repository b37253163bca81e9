#![allow(dead_code)]

use board_schema::entities::{post, user};
use board_schema::runner;
use sea_orm::prelude::DateTime;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

/// A private in-memory SQLite database. One pooled connection keeps every
/// query on the same database.
pub async fn memory_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(opts).await.unwrap()
}

pub async fn migrated_db() -> DatabaseConnection {
    let db = memory_db().await;
    runner::upgrade_to_head(&db).await.unwrap();
    db
}

pub async fn insert_user(db: &DatabaseConnection, id: i32, username: &str) -> user::Model {
    user::ActiveModel {
        id: Set(id),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_post(
    db: &DatabaseConnection,
    id: i32,
    user_id: Option<i32>,
    created_at: Option<DateTime>,
) -> post::Model {
    let mut post = post::ActiveModel {
        id: Set(id),
        title: Set(format!("Post {id}")),
        content: Set(Some("Content".to_string())),
        user_id: Set(user_id),
        ..Default::default()
    };
    if let Some(at) = created_at {
        post.created_at = Set(Some(at));
    }
    post.insert(db).await.unwrap()
}

pub fn at(date: &str) -> DateTime {
    DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap()
}
