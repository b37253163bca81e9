mod common;

use board_schema::entities::{active_user, post, user};
use board_schema::views;
use common::{at, insert_post, insert_user, migrated_db};
use sea_orm::{
    ActiveModelTrait, DbErr, EntityTrait, IdenStatic, Iterable, ModelTrait, QueryOrder, Set,
};

#[tokio::test]
async fn view_is_queryable_when_empty() {
    let db = migrated_db().await;
    let rows = active_user::Entity::find().all(&db).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn single_post_makes_user_active() {
    let db = migrated_db().await;
    insert_user(&db, 1, "testuser").await;
    insert_post(&db, 1, Some(1), None).await;

    let rows = active_user::Entity::find().all(&db).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username, "testuser");
    assert_eq!(rows[0].email, "testuser@example.com");
    assert_eq!(rows[0].post_count, 1);
    assert!(rows[0].last_post_date.is_some());
}

#[tokio::test]
async fn users_without_posts_are_excluded() {
    let db = migrated_db().await;
    insert_user(&db, 1, "writer").await;
    insert_user(&db, 2, "lurker").await;
    insert_post(&db, 1, Some(1), None).await;

    let rows = active_user::Entity::find().all(&db).await.unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.username.as_str()).collect();
    assert_eq!(names, ["writer"]);
    assert!(
        active_user::Entity::find_by_username("lurker")
            .one(&db)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn counts_and_latest_post_per_user() {
    let db = migrated_db().await;
    insert_user(&db, 1, "alice").await;
    insert_user(&db, 2, "bob").await;
    insert_post(&db, 1, Some(1), Some(at("2024-01-01 10:00:00"))).await;
    insert_post(&db, 2, Some(1), Some(at("2024-03-05 08:30:00"))).await;
    insert_post(&db, 3, Some(1), Some(at("2024-02-11 23:59:59"))).await;
    insert_post(&db, 4, Some(2), Some(at("2023-12-24 18:00:00"))).await;

    let rows = active_user::Entity::find()
        .order_by_asc(active_user::Column::Id)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].username, "alice");
    assert_eq!(rows[0].post_count, 3);
    assert_eq!(rows[0].last_post_date, Some(at("2024-03-05 08:30:00")));

    assert_eq!(rows[1].username, "bob");
    assert_eq!(rows[1].post_count, 1);
    assert_eq!(rows[1].last_post_date, Some(at("2023-12-24 18:00:00")));
    assert!(rows.iter().all(|r| r.post_count >= 1));
}

#[tokio::test]
async fn orphan_posts_do_not_count() {
    let db = migrated_db().await;
    insert_user(&db, 1, "alice").await;
    insert_post(&db, 1, None, None).await;
    insert_post(&db, 2, Some(1), None).await;

    let alice = active_user::Entity::find_by_username("alice")
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.post_count, 1);
    assert_eq!(active_user::Entity::find().all(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn view_follows_deleted_posts() {
    let db = migrated_db().await;
    insert_user(&db, 1, "alice").await;
    let post = insert_post(&db, 1, Some(1), None).await;
    assert_eq!(active_user::Entity::find().all(&db).await.unwrap().len(), 1);

    post.delete(&db).await.unwrap();
    assert!(active_user::Entity::find().all(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn created_at_defaults_on_insert() {
    let db = migrated_db().await;
    insert_user(&db, 1, "alice").await;
    let post = insert_post(&db, 1, Some(1), None).await;

    let stored = post::Entity::find_by_id(post.id).one(&db).await.unwrap().unwrap();
    assert!(stored.created_at.is_some());
}

#[tokio::test]
async fn user_posts_relation() {
    let db = migrated_db().await;
    let alice = insert_user(&db, 1, "alice").await;
    insert_post(&db, 1, Some(1), None).await;
    insert_post(&db, 2, Some(1), None).await;

    let posts = alice.find_related(post::Entity).all(&db).await.unwrap();
    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn database_enforces_unique_username() {
    let db = migrated_db().await;
    insert_user(&db, 1, "alice").await;

    let dup = user::ActiveModel {
        id: Set(2),
        username: Set("alice".into()),
        email: Set("other@example.com".into()),
    }
    .insert(&db)
    .await;
    assert!(dup.is_err());
}

#[tokio::test]
async fn database_enforces_unique_email() {
    let db = migrated_db().await;
    insert_user(&db, 1, "alice").await;

    let dup = user::ActiveModel {
        id: Set(2),
        username: Set("alicia".into()),
        email: Set("alice@example.com".into()),
    }
    .insert(&db)
    .await;
    assert!(dup.is_err());
}

#[tokio::test]
async fn database_enforces_post_owner() {
    let db = migrated_db().await;

    let orphan = post::ActiveModel {
        id: Set(1),
        title: Set("nobody".into()),
        user_id: Set(Some(42)),
        ..Default::default()
    }
    .insert(&db)
    .await;
    assert!(orphan.is_err());
}

#[tokio::test]
async fn view_entity_rejects_writes() {
    let db = migrated_db().await;

    let err = active_user::ActiveModel {
        id: Set(1),
        username: Set("ghost".into()),
        email: Set("ghost@example.com".into()),
        post_count: Set(1),
        last_post_date: Set(None),
    }
    .insert(&db)
    .await
    .unwrap_err();
    assert!(matches!(err, DbErr::Custom(msg) if msg.contains("read-only")));
}

#[test]
fn entity_columns_match_view_definition() {
    let columns: Vec<String> = active_user::Column::iter()
        .map(|c| c.as_str().to_owned())
        .collect();
    assert_eq!(columns, views::ACTIVE_USERS.columns);
}
