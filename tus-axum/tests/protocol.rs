use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use tus_axum::{router, TusAxumState, TusOptions};
use tus_upload::{MemoryRecordStore, MemoryStorage, UploadConfig, UploadEngine};

const OFFSET_STREAM: &str = "application/offset+octet-stream";

fn app_with(config: UploadConfig) -> Router {
    let engine = UploadEngine::new(MemoryStorage::new(), MemoryRecordStore::new(), config);
    router(TusAxumState::new(engine, TusOptions::default()))
}

fn app() -> Router {
    app_with(UploadConfig::default())
}

fn tus(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("tus-resumable", "1.0.0")
}

fn header<'a>(res: &'a Response, name: &str) -> Option<&'a str> {
    res.headers().get(name).and_then(|v| v.to_str().ok())
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn create(app: &Router, length: u64) -> String {
    let res = send(
        app,
        tus("POST", "/files")
            .header("upload-length", length.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    header(&res, "location").unwrap().to_string()
}

fn patch(location: &str, offset: u64, data: &'static [u8]) -> Request<Body> {
    tus("PATCH", location)
        .header("content-type", OFFSET_STREAM)
        .header("content-length", data.len().to_string())
        .header("upload-offset", offset.to_string())
        .body(Body::from(data))
        .unwrap()
}

#[tokio::test]
async fn options_advertises_capabilities() {
    let res = send(
        &app(),
        Request::builder()
            .method("OPTIONS")
            .uri("/files")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "tus-resumable"), Some("1.0.0"));
    assert_eq!(header(&res, "tus-version"), Some("1.0.0"));
    assert_eq!(
        header(&res, "tus-extension"),
        Some("creation,creation-defer-length,creation-with-upload,expiration,termination")
    );
    assert_eq!(header(&res, "tus-checksum-algorithm"), Some("md5,sha1,crc32"));
    assert_eq!(header(&res, "tus-max-size"), Some("128849018880"));
}

#[tokio::test]
async fn cors_preflight_does_not_shadow_capabilities() {
    let app = app();

    let res = send(
        &app,
        Request::builder()
            .method("OPTIONS")
            .uri("/files")
            .header("origin", "https://client.example.com")
            .header("access-control-request-method", "PATCH")
            .header("access-control-request-headers", "upload-offset,tus-resumable")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(res.status().is_success());
    assert_eq!(header(&res, "access-control-allow-origin"), Some("*"));
    assert_eq!(header(&res, "tus-version"), None);

    let res = send(
        &app,
        Request::builder()
            .method("OPTIONS")
            .uri("/files")
            .header("origin", "https://client.example.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "tus-version"), Some("1.0.0"));
    assert_eq!(header(&res, "tus-max-size"), Some("128849018880"));
    assert_eq!(header(&res, "tus-resumable"), Some("1.0.0"));
}

#[tokio::test]
async fn cors_headers_on_upload_responses() {
    let res = send(
        &app(),
        tus("POST", "/files")
            .header("origin", "https://client.example.com")
            .header("upload-length", "3")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(header(&res, "access-control-allow-origin"), Some("*"));
    let exposed = header(&res, "access-control-expose-headers").unwrap().to_ascii_lowercase();
    assert!(exposed.contains("location"));
    assert!(exposed.contains("upload-offset"));
}

#[tokio::test]
async fn ten_byte_upload_over_http() {
    let app = app();
    let location = create(&app, 10).await;
    assert!(location.starts_with("/files/"));

    let res = send(&app, patch(&location, 0, b"01234")).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "upload-offset"), Some("5"));
    assert!(header(&res, "upload-expires").unwrap().ends_with(" GMT"));

    let res = send(&app, patch(&location, 5, b"56789")).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "upload-offset"), Some("10"));

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "upload-offset"), Some("10"));
    assert_eq!(header(&res, "upload-length"), Some("10"));
    assert_eq!(header(&res, "cache-control"), Some("no-store"));
    assert_eq!(header(&res, "tus-resumable"), Some("1.0.0"));
}

#[tokio::test]
async fn missing_version_is_412() {
    let res = send(
        &app(),
        Request::builder()
            .method("POST")
            .uri("/files")
            .header("upload-length", "5")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(header(&res, "tus-version"), Some("1.0.0"));
    assert_eq!(header(&res, "tus-resumable"), Some("1.0.0"));
    let body = json_body(res).await;
    assert_eq!(body["name"], "PreconditionFailed");
}

#[tokio::test]
async fn create_validates_headers() {
    let app = app();

    let res = send(&app, tus("POST", "/files").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-defer-length", "2")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-length", "5")
            .header("upload-defer-length", "1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-length", "-5")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn create_over_max_size_is_413() {
    let app = app_with(UploadConfig::new().with_max_size(4));
    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-length", "5")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(res).await["data"]["maxSize"], 4);
}

#[tokio::test]
async fn metadata_round_trips() {
    let app = app();
    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-defer-length", "1")
            .header("upload-metadata", "filename d29ybGRfZG9taW5hdGlvbi5wZGY=,is_confidential")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let location = header(&res, "location").unwrap().to_string();

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "upload-defer-length"), Some("1"));
    assert_eq!(header(&res, "upload-length"), None);
    let metadata = header(&res, "upload-metadata").unwrap();
    assert!(metadata.contains("filename d29ybGRfZG9taW5hdGlvbi5wZGY="));
    assert!(metadata.contains("is_confidential"));
}

#[tokio::test]
async fn deferred_length_is_resolved_by_patch() {
    let app = app();
    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-defer-length", "1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let location = header(&res, "location").unwrap().to_string();

    let res = send(&app, patch(&location, 0, b"abc")).await;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);

    let mut req = patch(&location, 0, b"abc");
    req.headers_mut().insert("upload-length", "3".parse().unwrap());
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "upload-offset"), Some("3"));

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(header(&res, "upload-length"), Some("3"));
    assert_eq!(header(&res, "upload-defer-length"), None);
}

#[tokio::test]
async fn stale_offset_is_409_with_current_offset() {
    let app = app();
    let location = create(&app, 10).await;
    send(&app, patch(&location, 0, b"abc")).await;

    let res = send(&app, patch(&location, 1, b"bc")).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(header(&res, "upload-offset"), Some("3"));
}

#[tokio::test]
async fn patch_validates_headers() {
    let app = app();
    let location = create(&app, 10).await;

    let res = send(
        &app,
        tus("PATCH", &location)
            .header("content-type", "application/octet-stream")
            .header("content-length", "1")
            .header("upload-offset", "0")
            .body(Body::from("a"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let res = send(
        &app,
        tus("PATCH", &location)
            .header("content-type", OFFSET_STREAM)
            .header("content-length", "1")
            .body(Body::from("a"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(
        &app,
        tus("PATCH", &location)
            .header("content-type", OFFSET_STREAM)
            .header("upload-offset", "0")
            .body(Body::from("a"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn short_body_is_460_with_partial_offset() {
    let app = app();
    let location = create(&app, 10).await;

    let req = tus("PATCH", &location)
        .header("content-type", OFFSET_STREAM)
        .header("content-length", "8")
        .header("upload-offset", "0")
        .body(Body::from("abc"))
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status().as_u16(), 460);
    assert_eq!(header(&res, "upload-offset"), Some("3"));
    assert_eq!(json_body(res).await["name"], "IncompleteWrite");

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(header(&res, "upload-offset"), Some("3"));
}

#[tokio::test]
async fn create_with_inline_data() {
    let app = app();
    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-length", "5")
            .header("content-type", OFFSET_STREAM)
            .header("content-length", "3")
            .body(Body::from("abc"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&res, "upload-offset"), Some("3"));
    assert!(header(&res, "location").is_some());
    assert!(header(&res, "upload-expires").is_some());
}

#[tokio::test]
async fn rejected_inline_data_is_412_but_resource_exists() {
    let app = app();
    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-length", "2")
            .header("content-type", OFFSET_STREAM)
            .header("content-length", "3")
            .body(Body::from("abc"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    let location = header(&res, "location").unwrap().to_string();

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "upload-offset"), Some("0"));
}

#[tokio::test]
async fn inline_data_on_deferred_upload_waits_for_patch() {
    let app = app();
    let res = send(
        &app,
        tus("POST", "/files")
            .header("upload-defer-length", "1")
            .header("content-type", OFFSET_STREAM)
            .header("content-length", "3")
            .body(Body::from("abc"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(header(&res, "upload-offset"), None);
    let location = header(&res, "location").unwrap().to_string();

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(header(&res, "upload-offset"), Some("0"));
    assert_eq!(header(&res, "upload-defer-length"), Some("1"));
}

#[tokio::test]
async fn inline_data_needs_offset_stream_type() {
    let res = send(
        &app(),
        tus("POST", "/files")
            .header("upload-length", "5")
            .header("content-type", "text/plain")
            .header("content-length", "3")
            .body(Body::from("abc"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let app = app();
    let location = create(&app, 4).await;

    for _ in 0..2 {
        let res = send(&app, tus("DELETE", &location).body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    let res = send(&app, tus("HEAD", &location).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_upload_is_404() {
    let app = app();
    let res = send(&app, tus("HEAD", "/files/doesnotexist").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&app, patch("/files/doesnotexist", 0, b"a")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&app, tus("GET", "/elsewhere").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&res, "tus-resumable"), Some("1.0.0"));
}

#[tokio::test]
async fn expired_upload_is_410() {
    let app = app_with(
        UploadConfig::new().with_expiration(Some(chrono::Duration::milliseconds(5))),
    );
    let location = create(&app, 4).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let res = send(&app, patch(&location, 0, b"a")).await;
    assert_eq!(res.status(), StatusCode::GONE);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let res = send(&app(), tus("HEAD", "/files/nope").body(Body::empty()).unwrap()).await;
    assert!(header(&res, "x-request-id").is_some());
}
