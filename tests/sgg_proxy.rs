mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use arenahub::sgg::{queries, ProxyError};
use common::{spawn_app, spawn_app_with, test_config, FakeUpstream};

fn game_directory() -> FakeUpstream {
    FakeUpstream::new(|query, variables| {
        assert_eq!(query, queries::VIDEOGAME_BY_NAME);
        let nodes = match variables["name"].as_str() {
            Some("Tekken 8") => json!([{ "id": 49783, "name": "TEKKEN 8" }]),
            Some("Tekken") => json!([
                { "id": 49783, "name": "TEKKEN 8" },
                { "id": 17, "name": "Tekken 7" }
            ]),
            _ => json!([]),
        };
        Ok(json!({ "videogames": { "nodes": nodes } }))
    })
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = spawn_app();

    let health = app.get("/api/health", None).await;
    assert_eq!(
        health.body,
        json!({ "ok": true, "services": ["startgg", "forums", "auth"] })
    );

    let sgg = app.get("/api/sgg/health", None).await;
    assert_eq!(sgg.body, json!({ "ok": true, "tokenLoaded": true }));
}

#[tokio::test]
async fn test_videogames_are_normalized_merged_and_cached() {
    let app = spawn_app_with(test_config(), game_directory());

    let res = app
        .post(
            "/api/sgg/videogames",
            None,
            json!({ "names": [" Tekken 8 ", "Tekken", "T", "Tekken 8"] }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let ids: Vec<i64> = res
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![49783, 17]);
    assert_eq!(app.upstream.call_count(), 2);

    // Same names again are answered from the cache
    app.post(
        "/api/sgg/videogames",
        None,
        json!({ "names": ["Tekken 8", "Tekken"] }),
    )
    .await;
    assert_eq!(app.upstream.call_count(), 2);

    let empty = app
        .post("/api/sgg/videogames", None, json!({ "names": ["x", " "] }))
        .await;
    assert_eq!(empty.body, json!([]));
    assert_eq!(app.upstream.call_count(), 2);
}

#[tokio::test]
async fn test_tournaments_use_defaults() {
    let upstream = FakeUpstream::new(|_, _| {
        Ok(json!({ "tournaments": { "nodes": [{ "id": 1, "slug": "tournament/evo" }] } }))
    });
    let app = spawn_app_with(test_config(), upstream);

    let res = app
        .post(
            "/api/sgg/tournaments",
            None,
            json!({ "videogameIds": [49783] }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body[0]["slug"], "tournament/evo");

    let calls = app.upstream.calls.lock().unwrap();
    let (query, variables) = &calls[0];
    assert_eq!(query, queries::TOURNAMENTS_BY_GAME_AND_COUNTRY);
    assert_eq!(
        variables,
        &json!({ "perPage": 20, "c": "BR", "g": [49783] })
    );
}

#[tokio::test]
async fn test_missing_upstream_data_maps_to_empty_shapes() {
    let app = spawn_app_with(test_config(), FakeUpstream::new(|_, _| Ok(Value::Null)));

    let events = app
        .post(
            "/api/sgg/eventsByTournament",
            None,
            json!({ "slug": "tournament/nothing" }),
        )
        .await;
    assert_eq!(events.body, json!([]));

    let entrants = app
        .post("/api/sgg/eventEntrants", None, json!({ "eventId": 5 }))
        .await;
    assert_eq!(
        entrants.body,
        json!({ "pageInfo": { "total": 0, "totalPages": 0 }, "nodes": [] })
    );

    let sets = app
        .post("/api/sgg/eventSets", None, json!({ "eventId": 5, "page": 2 }))
        .await;
    assert_eq!(sets.body, json!({ "pageInfo": { "total": 0 }, "nodes": [] }));

    let calls = app.upstream.calls.lock().unwrap();
    let entrant_vars = &calls[1].1;
    assert_eq!(entrant_vars, &json!({ "eventId": 5, "page": 1, "perPage": 25 }));
    let set_vars = &calls[2].1;
    assert_eq!(set_vars, &json!({ "eventId": 5, "page": 2, "perPage": 20 }));
}

#[tokio::test]
async fn test_upstream_errors_surface_as_500_with_details() {
    let upstream = FakeUpstream::new(|_, _| {
        Err(ProxyError::Upstream {
            status: 401,
            errors: vec![json!({ "message": "Invalid authentication token" })],
        })
    });
    let app = spawn_app_with(test_config(), upstream);

    let res = app
        .post("/api/sgg/eventSets", None, json!({ "eventId": 1 }))
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["status"], 401);
    assert_eq!(
        res.body["errors"][0]["message"],
        "Invalid authentication token"
    );

    // Failures are retried rather than cached
    app.post("/api/sgg/eventSets", None, json!({ "eventId": 1 }))
        .await;
    assert_eq!(app.upstream.call_count(), 2);
}

#[tokio::test]
async fn test_missing_body_falls_back_to_defaults() {
    let upstream = FakeUpstream::new(|_, _| Ok(json!({ "tournaments": { "nodes": [] } })));
    let app = spawn_app_with(test_config(), upstream);

    let res = app
        .request(Method::POST, "/api/sgg/tournaments", None, None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!([]));

    let calls = app.upstream.calls.lock().unwrap();
    assert_eq!(calls[0].1, json!({ "perPage": 20, "c": "BR", "g": [] }));
}

#[tokio::test]
async fn test_mistyped_fields_are_validation_errors() {
    let app = spawn_app();

    let res = app
        .post(
            "/api/sgg/eventSets",
            None,
            json!({ "eventId": 1, "page": "two" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Validation failed");
    assert!(res.body["details"]["formErrors"][0].is_string());

    let negative = app
        .post(
            "/api/sgg/eventEntrants",
            None,
            json!({ "eventId": 1, "perPage": 0 }),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
    assert!(negative.body["details"]["fieldErrors"]["perPage"].is_array());
    assert_eq!(app.upstream.call_count(), 0);
}
