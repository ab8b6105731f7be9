mod common;

use axum::http::StatusCode;
use serde_json::json;

use arenahub::db::models::Role;
use common::spawn_app;

#[tokio::test]
async fn test_role_gates() {
    let app = spawn_app();
    let (user, _) = app.register("alice").await;
    let (moderator, _) = app.register_with_role("mod", Role::Mod).await;
    let thread_id = app.create_thread(&user, "Gate check").await;

    let pin = format!("/api/admin/threads/{}/pin", thread_id);
    assert_eq!(
        app.post(&pin, None, json!({})).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.post(&pin, Some(&user), json!({})).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.post(&pin, Some(&moderator), json!({})).await.status,
        StatusCode::OK
    );

    // Thread deletion is ADMIN only
    let del = app
        .delete(&format!("/api/admin/threads/{}", thread_id), Some(&moderator))
        .await;
    assert_eq!(del.status, StatusCode::FORBIDDEN);
    assert_eq!(app.count("SELECT COUNT(*) FROM forum_threads"), 1);
}

#[tokio::test]
async fn test_pin_and_lock_toggle() {
    let app = spawn_app();
    let (moderator, _) = app.register_with_role("mod", Role::Mod).await;
    let thread_id = app.create_thread(&moderator, "Toggle target").await;
    let pin = format!("/api/admin/threads/{}/pin", thread_id);
    let lock = format!("/api/admin/threads/{}/lock", thread_id);

    let first = app.post(&pin, Some(&moderator), json!({})).await;
    assert_eq!(first.body, json!({ "success": true, "isPinned": true }));
    let second = app.post(&pin, Some(&moderator), json!({})).await;
    assert_eq!(second.body["isPinned"], false);

    let locked = app.post(&lock, Some(&moderator), json!({})).await;
    assert_eq!(locked.body, json!({ "success": true, "isLocked": true }));

    let missing = app
        .post("/api/admin/threads/9999/pin", Some(&moderator), json!({}))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_deleted_post_hides_body_for_everyone() {
    let app = spawn_app();
    let (author, _) = app.register("alice").await;
    let (admin, _) = app.register_with_role("boss", Role::Admin).await;
    let thread_id = app.create_thread(&author, "Moderated thread").await;
    let post = app.reply(&author, thread_id, "something rude").await;
    let post_id = post.body["id"].as_i64().unwrap();

    let deleted = app
        .delete(&format!("/api/admin/posts/{}", post_id), Some(&admin))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["success"], true);
    assert!(deleted.body["post"]["body"].is_null());

    for viewer in [None, Some(author.as_str()), Some(admin.as_str())] {
        let res = app.get(&format!("/api/forums/posts/{}", post_id), viewer).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body["body"].is_null());
        assert_eq!(res.body["isDeleted"], true);
        assert!(res.body["deletedAt"].is_string());
    }

    // The row is kept
    assert_eq!(app.count("SELECT COUNT(*) FROM forum_posts"), 1);

    let detail = app
        .get(&format!("/api/forums/threads/{}", thread_id), None)
        .await;
    assert!(detail.body["posts"].as_array().unwrap().is_empty());

    let again = app
        .delete(&format!("/api/admin/posts/{}", post_id), Some(&admin))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["error"], "Post already deleted");
}

#[tokio::test]
async fn test_admin_thread_delete_cascades() {
    let app = spawn_app();
    let (author, _) = app.register("alice").await;
    let (admin, _) = app.register_with_role("boss", Role::Admin).await;
    let doomed = app.create_thread(&author, "Doomed thread").await;
    let survivor = app.create_thread(&author, "Survivor thread").await;
    app.reply(&author, doomed, "reply one").await;
    app.reply(&admin, doomed, "reply two").await;
    app.reply(&author, survivor, "keep me").await;
    app.post(
        &format!("/api/forums/threads/{}/vote", doomed),
        Some(&author),
        json!({ "value": 1 }),
    )
    .await;

    let res = app
        .delete(&format!("/api/admin/threads/{}", doomed), Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);

    assert_eq!(app.count("SELECT COUNT(*) FROM forum_threads"), 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM forum_posts"), 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM forum_votes"), 0);

    let gone = app
        .get(&format!("/api/forums/threads/{}", doomed), None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_thread_delete_leaves_no_partial_state() {
    let app = spawn_app();
    let (author, _) = app.register("alice").await;
    let (admin, _) = app.register_with_role("boss", Role::Admin).await;
    let thread_id = app.create_thread(&author, "Protected thread").await;
    app.reply(&author, thread_id, "still here").await;
    app.post(
        &format!("/api/forums/threads/{}/vote", thread_id),
        Some(&author),
        json!({ "value": -1 }),
    )
    .await;

    // Make the final statement of the cascade fail
    {
        let conn = app.db.get().unwrap();
        conn.execute_batch(
            "CREATE TRIGGER refuse_thread_delete BEFORE DELETE ON forum_threads
             BEGIN SELECT RAISE(ABORT, 'refused'); END;",
        )
        .unwrap();
    }

    let res = app
        .delete(&format!("/api/admin/threads/{}", thread_id), Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "Internal server error");

    assert_eq!(app.count("SELECT COUNT(*) FROM forum_threads"), 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM forum_posts"), 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM forum_votes"), 1);
}

#[tokio::test]
async fn test_admin_sets_roles() {
    let app = spawn_app();
    let (user, user_id) = app.register("alice").await;
    let (admin, _) = app.register_with_role("boss", Role::Admin).await;
    let uri = format!("/api/admin/users/{}/role", user_id);

    let by_user = app.post(&uri, Some(&user), json!({ "role": "ADMIN" })).await;
    assert_eq!(by_user.status, StatusCode::FORBIDDEN);

    let promoted = app.post(&uri, Some(&admin), json!({ "role": "MOD" })).await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["user"]["role"], "MOD");

    // The new role applies to the existing session
    let thread_id = app.create_thread(&user, "Now I moderate").await;
    let pin = app
        .post(
            &format!("/api/admin/threads/{}/pin", thread_id),
            Some(&user),
            json!({}),
        )
        .await;
    assert_eq!(pin.status, StatusCode::OK);

    let bad_role = app.post(&uri, Some(&admin), json!({ "role": "GOD" })).await;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);

    let ghost = app
        .post(
            "/api/admin/users/no-such-user/role",
            Some(&admin),
            json!({ "role": "MOD" }),
        )
        .await;
    assert_eq!(ghost.status, StatusCode::NOT_FOUND);
}
