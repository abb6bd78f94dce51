//! Router-level tests driven through `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::*;
use family_photos_core::domain::Target;
use family_photos_core::ports::DatabaseService;
use photos_api::adapters::DbAdapter;
use photos_api::web;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: DbAdapter,
    pool: sqlx::SqlitePool,
    _media: TempDir,
}

async fn app(open_registration: bool) -> TestApp {
    let pool = test_pool().await;
    let db = migrated(pool.clone()).await;
    let media = TempDir::new().unwrap();
    let router = web::router(test_state(db.clone(), &media, open_registration));
    TestApp {
        router,
        db,
        pool,
        _media: media,
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, headers, json)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

//=========================================================================================
// Authentication
//=========================================================================================

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = app(true).await;

    let req = Request::builder().uri("/photos").body(Body::empty()).unwrap();
    let (status, _, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app.router, get("/stats", "not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_lookup_failure_is_a_server_error() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;

    app.pool.close().await;

    let (status, _, _) = send(&app.router, get("/stats", &token)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn magic_link_login_round_trip() {
    let app = app(true).await;

    let req = post_json("/auth/magic-link", None, json!({ "email": "Nana@Family.example" }));
    let (status, _, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let token: String = sqlx::query_scalar("SELECT token FROM magic_links")
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let verify = || {
        Request::builder()
            .uri(format!("/auth/verify?token={}", token))
            .body(Body::empty())
            .unwrap()
    };
    let (status, headers, body) = send(&app.router, verify()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "nana@family.example");
    assert_eq!(body["displayName"], "nana");
    assert_eq!(body["isAdmin"], false);
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    // The link only works once.
    let (status, _, _) = send(&app.router, verify()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let session = body["token"].as_str().unwrap().to_string();
    let (status, _, me) = send(&app.router, get("/auth/me", &session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "nana@family.example");

    let logout = Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::COOKIE, format!("session={}", session))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, logout).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app.router, get("/auth/me", &session)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn closed_registration_turns_away_strangers() {
    let app = app(false).await;
    seed_user(&app.db, "nana@family.example", false).await;

    let req = post_json("/auth/magic-link", None, json!({ "email": "stranger@example.com" }));
    let (status, _, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = post_json("/auth/magic-link", None, json!({ "email": "nana@family.example" }));
    let (status, _, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let req = post_json("/auth/magic-link", None, json!({ "email": "not an email" }));
    let (status, _, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

//=========================================================================================
// Listings
//=========================================================================================

#[tokio::test]
async fn photo_listing_applies_query_parameters() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;
    seed_photo(&app.db, nana.id, &["family", "beach"]).await;
    seed_photo(&app.db, nana.id, &["family"]).await;
    seed_located_photo(&app.db, nana.id).await;

    let (status, _, body) = send(&app.router, get("/photos?tags=Family,beach", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["hasMore"], false);

    let (_, _, body) = send(&app.router, get("/photos?hasLocation=true", &token)).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["items"][0]["location"]["latitude"].is_number());

    let (_, _, body) = send(&app.router, get("/photos?limit=2", &token)).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["hasMore"], true);

    let (status, _, _) = send(&app.router, get("/photos?sort=caption;DROP", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app.router, get("/photos?startDate=last-week", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn album_photos_include_the_album_header() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;
    let album = app.db.create_album("Summer", nana.id).await.unwrap();
    seed_photo_in(&app.db, nana.id, album.id).await;
    seed_photo(&app.db, nana.id, &[]).await;

    let uri = format!("/albums/{}/photos", album.id);
    let (status, _, body) = send(&app.router, get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["album"]["name"], "Summer");
    assert_eq!(body["album"]["photoCount"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _, body) = send(&app.router, get("/albums?sort=photoCount", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 10);

    let uri = format!("/albums/{}/photos", uuid::Uuid::new_v4());
    let (status, _, _) = send(&app.router, get(&uri, &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_requires_a_query() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;

    let (status, _, _) = send(&app.router, get("/search", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = send(&app.router, get("/search?q=%20%20", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut photo = new_photo(nana.id, &[]);
    photo.caption = Some("Grandpa's boat".to_string());
    app.db.create_photo(photo).await.unwrap();
    let (status, _, body) = send(&app.router, get("/search?q=boat", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stats_and_activity_are_served() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;
    seed_photo(&app.db, nana.id, &["dog"]).await;

    let (status, _, body) = send(&app.router, get("/stats", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPhotos"], 1);
    assert_eq!(body["recentUploads"], 1);
    assert_eq!(body["topTags"][0]["name"], "dog");

    let (status, _, body) = send(&app.router, get("/activity/recent?days=3", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 3);
    assert_eq!(body["photos"].as_array().unwrap().len(), 1);
}

//=========================================================================================
// Ownership rules
//=========================================================================================

#[tokio::test]
async fn only_author_or_admin_may_delete_a_comment() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let opa = seed_user(&app.db, "opa@family.example", false).await;
    let admin = seed_user(&app.db, "admin@family.example", true).await;
    let photo = seed_photo(&app.db, nana.id, &[]).await;

    let nana_token = login(&app.db, &nana).await;
    let opa_token = login(&app.db, &opa).await;
    let admin_token = login(&app.db, &admin).await;

    let uri = format!("/photos/{}/comments", photo.id);
    let (status, _, body) = send(
        &app.router,
        post_json(&uri, Some(&nana_token), json!({ "content": "What a view" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first = body["id"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &app.router,
        post_json(&uri, Some(&nana_token), json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app.router, delete(&format!("/comments/{}", first), &opa_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.db.get_comment(first.parse().unwrap()).await.is_ok());

    let (status, _, _) = send(&app.router, delete(&format!("/comments/{}", first), &nana_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let second = app
        .db
        .add_comment(Target::Photo(photo.id), opa.id, "Agreed")
        .await
        .unwrap();
    let (status, _, _) =
        send(&app.router, delete(&format!("/comments/{}", second.id), &admin_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) =
        send(&app.router, delete(&format!("/comments/{}", second.id), &admin_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reactions_toggle_on_albums_and_stack_on_photos() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let opa = seed_user(&app.db, "opa@family.example", false).await;
    let token = login(&app.db, &nana).await;
    let opa_token = login(&app.db, &opa).await;
    let album = app.db.create_album("Summer", nana.id).await.unwrap();
    let photo = seed_photo(&app.db, nana.id, &[]).await;

    let uri = format!("/albums/{}/reactions", album.id);
    let (_, _, body) = send(&app.router, post_json(&uri, Some(&token), json!({ "type": "❤️" }))).await;
    assert_eq!(body["active"], true);
    let (_, _, body) = send(&app.router, post_json(&uri, Some(&token), json!({ "type": "❤️" }))).await;
    assert_eq!(body["active"], false);

    let uri = format!("/photos/{}/reactions", photo.id);
    let (status, _, body) =
        send(&app.router, post_json(&uri, Some(&token), json!({ "type": "😂" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "😂");
    let reaction = body["id"].as_str().unwrap().to_string();

    let (status, _, _) =
        send(&app.router, delete(&format!("/reactions/{}", reaction), &opa_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = send(&app.router, delete(&format!("/reactions/{}", reaction), &token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn only_the_uploader_edits_photo_metadata() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let opa = seed_user(&app.db, "opa@family.example", false).await;
    let photo = seed_photo(&app.db, nana.id, &[]).await;
    let nana_token = login(&app.db, &nana).await;
    let opa_token = login(&app.db, &opa).await;

    let patch = |token: &str, body: Value| {
        Request::builder()
            .method("PATCH")
            .uri(format!("/photos/{}", photo.id))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let (status, _, _) = send(&app.router, patch(&opa_token, json!({ "caption": "Mine now" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({
        "caption": "Lake at dusk",
        "location": { "latitude": 46.5, "longitude": 8.0, "altitude": 1200.0 }
    });
    let (status, _, body) = send(&app.router, patch(&nana_token, body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["caption"], "Lake at dusk");
    assert_eq!(body["location"]["altitude"], 1200.0);

    let (status, _, _) = send(
        &app.router,
        patch(&nana_token, json!({ "location": { "latitude": 123.0, "longitude": 0.0 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tags_uri = format!("/photos/{}/tags", photo.id);
    let (status, _, body) = send(
        &app.router,
        post_json(&tags_uri, Some(&opa_token), json!({ "tags": ["Lake", "lake", "Alps"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["alps", "lake"]));

    let (status, _, _) =
        send(&app.router, delete(&format!("/photos/{}/tags/LAKE", photo.id), &opa_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn admin_routes_reject_members() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let admin = seed_user(&app.db, "admin@family.example", true).await;
    let nana_token = login(&app.db, &nana).await;
    let admin_token = login(&app.db, &admin).await;

    let (status, _, _) = send(&app.router, get("/admin/users", &nana_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let new_user = json!({ "email": "Cousin@Family.example", "displayName": "Cousin Kim", "groups": ["cousins"] });
    let (status, _, _) = send(
        &app.router,
        post_json("/admin/users", Some(&nana_token), new_user.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app.router,
        post_json("/admin/users", Some(&admin_token), new_user.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "cousin@family.example");
    assert_eq!(body["displayName"], "Cousin Kim");
    assert_eq!(body["groups"], json!(["cousins"]));

    let (status, _, _) = send(
        &app.router,
        post_json("/admin/users", Some(&admin_token), new_user),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&app.router, get("/admin/users", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["displayName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["admin", "Cousin Kim", "nana"]);
}

//=========================================================================================
// Uploads
//=========================================================================================

#[tokio::test]
async fn multipart_upload_creates_album_and_serves_media() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;

    let boundary = "photo-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"albumName\"\r\n\r\nBeach 2024\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"tags\"\r\n\r\nSea, Sand\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"wave.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\nJPEGDATA\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"readme.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let req = Request::builder()
        .method("POST")
        .uri("/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap();

    let (status, _, report) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["errors"][0]["fileName"], "readme.txt");
    assert_eq!(report["photos"][0]["tags"], json!(["sand", "sea"]));

    let album_id: uuid::Uuid = report["albumId"].as_str().unwrap().parse().unwrap();
    let album = app.db.get_album(album_id).await.unwrap();
    assert_eq!(album.name, "Beach 2024");
    assert_eq!(album.photo_count, 1);

    let url = report["photos"][0]["url"].as_str().unwrap().to_string();
    let resp = app.router.clone().oneshot(get(&url, &token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"JPEGDATA");

    let anonymous = Request::builder().uri(url).body(Body::empty()).unwrap();
    let (status, _, _) = send(&app.router, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn html_disguised_as_an_image_is_never_served_as_html() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;

    let boundary = "xss-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"x.html\"\r\n\
         Content-Type: image/png\r\n\r\n<script>alert(1)</script>\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"logo.svg\"\r\n\
         Content-Type: image/svg+xml\r\n\r\n<svg onload=\"alert(1)\"/>\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let req = Request::builder()
        .method("POST")
        .uri("/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap();

    let (status, _, report) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["errors"][0]["fileName"], "logo.svg");

    let url = report["photos"][0]["url"].as_str().unwrap().to_string();
    assert!(url.ends_with(".png"), "stored as {}", url);

    let resp = app.router.clone().oneshot(get(&url, &token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(!content_type.contains("html"), "served as {}", content_type);
    assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn upload_without_files_is_rejected() {
    let app = app(true).await;
    let nana = seed_user(&app.db, "nana@family.example", false).await;
    let token = login(&app.db, &nana).await;

    let boundary = "empty-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nNothing\r\n--{b}--\r\n",
        b = boundary
    );
    let req = Request::builder()
        .method("POST")
        .uri("/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap();

    let (status, _, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
