//! Router level tests for `POST /upload`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn upload_returns_url_of_identical_file() {
    let dir = TempDir::new().unwrap();
    let payload = b"some file contents\n\x00\x01\x02";

    let response = test_app(&dir)
        .oneshot(post_multipart(
            "/upload",
            None,
            &[
                Part::Text("key", TEST_KEY),
                Part::File {
                    name: "file",
                    filename: "report.txt",
                    content_type: "text/plain",
                    data: payload,
                },
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let url = json["file_url"].as_str().unwrap();
    assert_eq!(url, format!("{}report.txt", FILE_URL_PREFIX));
    assert_eq!(std::fs::read(dir.path().join(stored_name(url))).unwrap(), payload);
}

#[tokio::test]
async fn large_file_after_key_is_stored_intact() {
    let dir = TempDir::new().unwrap();
    let payload: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect();

    let response = test_app(&dir)
        .oneshot(post_multipart(
            "/upload",
            None,
            &[
                Part::Text("key", TEST_KEY),
                Part::File {
                    name: "file",
                    filename: "big.bin",
                    content_type: "application/octet-stream",
                    data: &payload,
                },
                Part::Text("trailing", "ignored"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stored_files(&dir), vec!["big.bin".to_string()]);
    assert_eq!(std::fs::read(dir.path().join("big.bin")).unwrap(), payload);
}

#[tokio::test]
async fn key_may_follow_the_file_field() {
    let dir = TempDir::new().unwrap();

    let response = test_app(&dir)
        .oneshot(post_multipart(
            "/upload",
            None,
            &[
                Part::File {
                    name: "file",
                    filename: "late-key.bin",
                    content_type: "application/octet-stream",
                    data: b"abc",
                },
                Part::Text("key", TEST_KEY),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stored_files(&dir), vec!["late-key.bin".to_string()]);
}

#[tokio::test]
async fn random_name_keeps_extension() {
    let dir = TempDir::new().unwrap();

    let response = test_app(&dir)
        .oneshot(post_multipart(
            "/upload",
            None,
            &[
                Part::Text("key", TEST_KEY),
                Part::Text("randomname", "true"),
                Part::File {
                    name: "file",
                    filename: "cat.jpeg",
                    content_type: "image/jpeg",
                    data: b"\xff\xd8\xff\xe0",
                },
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let name = stored_name(json["file_url"].as_str().unwrap()).to_string();
    assert_ne!(name, "cat.jpeg");
    assert!(name.ends_with(".jpeg"));
    assert_eq!(name.len(), 24 + ".jpeg".len());
    assert_eq!(stored_files(&dir), vec![name]);
}

#[tokio::test]
async fn invalid_key_is_unauthorized_and_writes_nothing() {
    let dir = TempDir::new().unwrap();

    for key in ["", "not-the-key"] {
        let response = test_app(&dir)
            .oneshot(post_multipart(
                "/upload",
                None,
                &[
                    Part::Text("key", key),
                    Part::File {
                        name: "file",
                        filename: "a.txt",
                        content_type: "text/plain",
                        data: b"nope",
                    },
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["message"], "invalid upload key");
    }
    assert!(stored_files(&dir).is_empty());
}

#[tokio::test]
async fn missing_file_is_bad_request() {
    let dir = TempDir::new().unwrap();

    let response = test_app(&dir)
        .oneshot(post_multipart("/upload", None, &[Part::Text("key", TEST_KEY)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(stored_files(&dir).is_empty());
}

#[tokio::test]
async fn traversal_in_filename_stays_inside_storage() {
    let dir = TempDir::new().unwrap();

    let response = test_app(&dir)
        .oneshot(post_multipart(
            "/upload",
            None,
            &[
                Part::Text("key", TEST_KEY),
                Part::File {
                    name: "file",
                    filename: "../../outside.txt",
                    content_type: "text/plain",
                    data: b"contained",
                },
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stored_files(&dir), vec!["outside.txt".to_string()]);
    assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
}

#[tokio::test]
async fn other_methods_are_not_acknowledged() {
    let dir = TempDir::new().unwrap();

    let response = test_app(&dir)
        .oneshot(Request::builder().uri("/upload").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "nope!");
}
