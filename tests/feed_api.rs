mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn test_feed_post_round_trip_with_image() {
    let app = spawn_app();
    let (cookie, user_id) = app.register("alice").await;

    let created = app
        .post(
            "/api/feed",
            Some(&cookie),
            json!({
                "body": "  clutch round  ",
                "imageBase64": "UE5H",
                "imageMime": "image/png",
                "imageFilename": "clutch.png",
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["body"], "clutch round");
    assert_eq!(created.body["authorId"], user_id);
    assert_eq!(created.body["author"]["username"], "alice");
    assert_eq!(created.body["imageBase64"], "UE5H");

    let stored: Vec<u8> = {
        let conn = app.db.get().unwrap();
        conn.query_row("SELECT image_bytes FROM feed_posts", [], |r| r.get(0))
            .unwrap()
    };
    assert_eq!(stored, b"PNG");

    let list = app.get("/api/feed", None).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body.as_array().unwrap().len(), 1);
    assert_eq!(list.body[0]["imageMime"], "image/png");
}

#[tokio::test]
async fn test_feed_filters_by_author() {
    let app = spawn_app();
    let (alice, alice_id) = app.register("alice").await;
    let (bob, _) = app.register("bob").await;
    app.post("/api/feed", Some(&alice), json!({ "body": "from alice" }))
        .await;
    app.post("/api/feed", Some(&bob), json!({ "body": "from bob" }))
        .await;

    let all = app.get("/api/feed", None).await;
    assert_eq!(all.body.as_array().unwrap().len(), 2);
    assert_eq!(all.body[0]["body"], "from bob");
    assert!(all.body[0]["imageBase64"].is_null());

    let mine = app
        .get(&format!("/api/feed?authorId={}", alice_id), None)
        .await;
    let items = mine.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["body"], "from alice");
}

#[tokio::test]
async fn test_feed_post_rejections() {
    let app = spawn_app();

    let anon = app
        .post("/api/feed", None, json!({ "body": "who am I" }))
        .await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let (cookie, _) = app.register("alice").await;
    let blank = app
        .post("/api/feed", Some(&cookie), json!({ "body": "   " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let bad_image = app
        .post(
            "/api/feed",
            Some(&cookie),
            json!({ "body": "pic", "imageBase64": "%%%" }),
        )
        .await;
    assert_eq!(bad_image.status, StatusCode::BAD_REQUEST);
    assert!(bad_image.body["details"]["fieldErrors"]["imageBase64"].is_array());

    assert_eq!(app.count("SELECT COUNT(*) FROM feed_posts"), 0);
}
