use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::time::Duration;

use worth_the_watch::{db::MemoryStore, routes::create_router};

mod common;

fn create_test_server() -> TestServer {
    create_server_with(common::settings())
}

fn create_server_with(settings: worth_the_watch::routes::Settings) -> TestServer {
    let state = common::app_state(MemoryStore::new(), settings);
    TestServer::new(create_router(state)).unwrap()
}

fn user(name: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_static(name),
    )
}

/// Polls the status endpoint until the job settles
async fn wait_for_review(server: &TestServer, tmdb_id: i64) -> Value {
    for _ in 0..200 {
        let body: Value = server
            .get(&format!("/api/search/status/{}", tmdb_id))
            .await
            .json();
        if body["status"] != "generating" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation for {} never finished", tmdb_id);
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let server = create_test_server();
    let response = server.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_search_returns_tmdb_candidates() {
    let server = create_test_server();
    let response = server.get("/api/search?q=Heat").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["found_in_db"], false);
    assert!(body["movie"].is_null());
    assert!(body["generation_status"].is_null());
    assert_eq!(body["tmdb_results"].as_array().unwrap().len(), 2);
    assert_eq!(body["tmdb_results"][0]["tmdb_id"], 949);
    assert_eq!(
        body["tmdb_results"][0]["poster_url"],
        "https://image.tmdb.org/t/p/w500/poster.jpg"
    );
}

#[tokio::test]
async fn test_search_rejects_blank_query() {
    let server = create_test_server();
    let response = server.get("/api/search?q=%20%20").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_then_status_completed() {
    let server = create_test_server();

    let response = server.post("/api/search/generate/949").await;
    response.assert_status_ok();
    let started: Value = response.json();
    assert_eq!(started["tmdb_id"], 949);
    assert_eq!(started["status"], "generating");

    let done = wait_for_review(&server, 949).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["movie"]["movie"]["tmdb_id"], 949);
    assert_eq!(done["movie"]["review"]["verdict"], "WORTH IT");
    assert_eq!(done["movie"]["review"]["llm_model"], "fake-model");

    // A second request sees the stored review instead of starting a job
    let again: Value = server.post("/api/search/generate/949").await.json();
    assert_eq!(again["status"], "already_exists");

    // The title is now served from the database
    let found: Value = server.get("/api/search?q=Title%20949").await.json();
    assert_eq!(found["found_in_db"], true);
    assert_eq!(found["generation_status"], "completed");

    server.get("/api/movies/949").await.assert_status_ok();
    let listing: Value = server.get("/api/movies?category=worth-it").await.json();
    assert_eq!(listing["total"], 1);
}

#[tokio::test]
async fn test_regenerate_replaces_existing_review() {
    let server = create_test_server();
    server.post("/api/search/generate/12").await.assert_status_ok();
    assert_eq!(wait_for_review(&server, 12).await["status"], "completed");

    let response = server.post("/api/search/regenerate/12").await;
    response.assert_status_ok();
    let started: Value = response.json();
    assert_eq!(started["status"], "generating");
    assert_eq!(wait_for_review(&server, 12).await["status"], "completed");
}

#[tokio::test]
async fn test_unknown_title_reports_error() {
    let server = create_test_server();
    server
        .post("/api/search/generate/900001")
        .await
        .assert_status_ok();

    let done = wait_for_review(&server, 900001).await;
    assert_eq!(done["status"], "error");
    assert_eq!(done["error"], "Title 900001 not found on TMDB");
}

#[tokio::test]
async fn test_status_of_unknown_title_is_not_found() {
    let server = create_test_server();
    let body: Value = server.get("/api/search/status/77").await.json();
    assert_eq!(body, json!({ "status": "not_found" }));
}

#[tokio::test]
async fn test_generate_rejects_bad_input() {
    let server = create_test_server();
    server
        .post("/api/search/generate/0")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/search/generate/5?media_type=podcast")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generation_is_rate_limited_per_ip() {
    let mut settings = common::settings();
    settings.limits.per_ip_per_hour = 2;
    let server = create_server_with(settings);

    for id in [101, 102] {
        server
            .post(&format!("/api/search/generate/{}", id))
            .add_header(
                HeaderName::from_static("x-forwarded-for"),
                HeaderValue::from_static("203.0.113.9"),
            )
            .await
            .assert_status_ok();
    }

    let response = server
        .post("/api/search/generate/103")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.9"),
        )
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert!(body["error"].is_string());

    // Another client is unaffected
    server
        .post("/api/search/generate/103")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("198.51.100.4"),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_movie_not_found() {
    let server = create_test_server();
    let response = server.get("/api/movies/42").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Movie 42 not found");
}

#[tokio::test]
async fn test_movies_rejects_bad_paging() {
    let server = create_test_server();
    server
        .get("/api/movies?limit=500")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/movies?category=unknown")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_watchlist_requires_user() {
    let server = create_test_server();
    server
        .get("/api/watchlist")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_watchlist_add_list_remove() {
    let server = create_test_server();
    let (name, alice) = user("alice");

    let entry = json!({ "tmdb_id": 603, "media_type": "movie", "title": "  The Matrix  " });
    let response = server
        .post("/api/watchlist")
        .add_header(name.clone(), alice.clone())
        .json(&entry)
        .await;
    response.assert_status_ok();
    let saved: Value = response.json();
    assert_eq!(saved["title"], "The Matrix");

    // Adding the same title again is an update, not a duplicate
    server
        .post("/api/watchlist")
        .add_header(name.clone(), alice.clone())
        .json(&entry)
        .await
        .assert_status_ok();

    let list: Vec<Value> = server
        .get("/api/watchlist")
        .add_header(name.clone(), alice.clone())
        .await
        .json();
    assert_eq!(list.len(), 1);

    // Other users have their own lists
    let (name_b, bob) = user("bob");
    let other: Vec<Value> = server.get("/api/watchlist").add_header(name_b, bob).await.json();
    assert!(other.is_empty());

    server
        .delete("/api/watchlist/603")
        .add_header(name.clone(), alice.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete("/api/watchlist/603")
        .add_header(name, alice)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_watchlist_cap() {
    let mut settings = common::settings();
    settings.watchlist_max_items = 2;
    let server = create_server_with(settings);
    let (name, alice) = user("alice");

    for id in [1, 2] {
        server
            .post("/api/watchlist")
            .add_header(name.clone(), alice.clone())
            .json(&json!({ "tmdb_id": id, "title": format!("Title {}", id) }))
            .await
            .assert_status_ok();
    }

    let response = server
        .post("/api/watchlist")
        .add_header(name.clone(), alice.clone())
        .json(&json!({ "tmdb_id": 3, "title": "Title 3" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Watchlist is full (max 2 items)");

    // Re-saving an existing entry is still allowed at the cap
    server
        .post("/api/watchlist")
        .add_header(name, alice)
        .json(&json!({ "tmdb_id": 1, "title": "Title 1 (Director's Cut)" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_versus_rejects_same_title() {
    let server = create_test_server();
    server
        .post("/api/versus/battle?movie_a_id=5&movie_b_id=5")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_versus_battle_is_cached() {
    let server = create_test_server();

    let first: Value = server
        .post("/api/versus/battle?movie_a_id=10&movie_b_id=20")
        .await
        .json();
    assert_eq!(first["winner_id"], 10);
    assert_eq!(first["loser_id"], 20);
    assert_eq!(first["winner_headline"], "The Winner");

    // Reversed order hits the cache and keeps the same winner
    let reversed: Value = server
        .post("/api/versus/battle?movie_a_id=20&movie_b_id=10")
        .await
        .json();
    assert_eq!(reversed["winner_id"], 10);
    assert_eq!(reversed["movie_a"]["tmdb_id"], 20);
}

#[tokio::test]
async fn test_versus_unknown_title() {
    let server = create_test_server();
    server
        .post("/api/versus/battle?movie_a_id=10&movie_b_id=900002")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
