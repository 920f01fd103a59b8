//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `shortloop_test`)
//!   `TEST_DB_PASSWORD` (default: `shortloop_test`)
//!   `TEST_DB_NAME` (default: `shortloop_test`)

#![allow(clippy::unwrap_used)]

use sea_orm::Set;
use shortloop_db::entities::{post, post_like, user};
use shortloop_db::repositories::{PostRepository, UserRepository};
use shortloop_db::test_utils::{TestDatabase, TestDbConfig};
use std::sync::Arc;

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    let result = db.cleanup().await;
    assert!(result.is_ok(), "Cleanup failed: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_like_toggle_round_trip() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    shortloop_db::migrate(db.connection()).await.expect("Migrations failed");

    let conn = Arc::clone(&db.conn);
    let users = UserRepository::new(Arc::clone(&conn));
    let posts = PostRepository::new(Arc::clone(&conn));

    let now = chrono::Utc::now();
    let alice = users
        .create(user::ActiveModel {
            id: Set("alice".to_string()),
            username: Set("alice".to_string()),
            username_lower: Set("alice".to_string()),
            email: Set("alice@example.com".to_string()),
            token: Set(None),
            bio: Set(None),
            avatar_url: Set(None),
            followers_count: Set(0),
            following_count: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        })
        .await
        .unwrap();

    let created = posts
        .create(post::ActiveModel {
            id: Set("p1".to_string()),
            user_id: Set(alice.id.clone()),
            video_url: Set("https://cdn.example.com/v.mp4".to_string()),
            thumbnail_url: Set(None),
            caption: Set(None),
            comments_count: Set(0),
            shares: Set(0),
            views: Set(0),
            allow_comments: Set(true),
            created_at: Set(now.into()),
        })
        .await
        .unwrap();

    let like = post_like::ActiveModel {
        id: Set("l1".to_string()),
        post_id: Set(created.id.clone()),
        user_id: Set(alice.id.clone()),
        created_at: Set(now.into()),
    };
    assert!(posts.insert_like(like.clone()).await.unwrap());
    // The unique pair index makes the second insert a no-op.
    assert!(!posts.insert_like(like).await.unwrap());
    assert_eq!(posts.count_likes(&created.id).await.unwrap(), 1);

    assert!(posts.delete_like(&created.id, &alice.id).await.unwrap());
    assert_eq!(posts.count_likes(&created.id).await.unwrap(), 0);

    db.drop_database().await.expect("Failed to drop database");
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
}
