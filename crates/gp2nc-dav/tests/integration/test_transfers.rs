//! Integration tests for uploads, downloads, copies and moves

use std::io::Write;

use gp2nc_core::ports::{IRemoteStore, UploadMetadata};
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, FILES};

#[tokio::test]
async fn test_put_streams_file_with_timestamp_headers() {
    let (server, client) = common::setup_dav_mock().await;
    let content = b"jpeg bytes for upload".to_vec();

    Mock::given(method("PUT"))
        .and(path(format!("{FILES}/Photos/2019/07/IMG%201.jpg")))
        .and(header("X-OC-MTime", "1563000000"))
        .and(header("X-OC-CTime", "1562000000"))
        .and(header("OC-Total-Length", content.len().to_string().as_str()))
        .and(body_bytes(content.clone()))
        .respond_with(ResponseTemplate::new(201).insert_header("OC-FileId", "555"))
        .expect(1)
        .mount(&server)
        .await;

    let mut local = tempfile::NamedTempFile::new().expect("temp file");
    local.write_all(&content).unwrap();
    local.flush().unwrap();

    let metadata = UploadMetadata {
        mtime: 1563000000,
        created_at: 1562000000,
        total_length: content.len() as u64,
    };
    let response = client
        .put(&format!("{FILES}/Photos/2019/07/IMG 1.jpg"), local.path(), &metadata)
        .await
        .expect("put");

    assert_eq!(response.status, 201);
    assert_eq!(response.file_id(), Some("555"));
}

#[tokio::test]
async fn test_put_missing_local_file_is_local_io_error() {
    let (_server, client) = common::setup_dav_mock().await;

    let metadata = UploadMetadata {
        mtime: 0,
        created_at: 0,
        total_length: 0,
    };
    let err = client
        .put(
            &format!("{FILES}/x.jpg"),
            std::path::Path::new("/nonexistent/x.jpg"),
            &metadata,
        )
        .await
        .unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_get_returns_body() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("{FILES}/Photos/a.jpg")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote content".to_vec()))
        .mount(&server)
        .await;

    let response = client.get(&format!("{FILES}/Photos/a.jpg")).await.expect("get");
    assert_eq!(response.status, 200);
    assert_eq!(response.body.as_deref(), Some(&b"remote content"[..]));
}

#[tokio::test]
async fn test_copy_sends_absolute_destination() {
    let (server, client) = common::setup_dav_mock().await;
    let albums = "/remote.php/dav/photos/alice/albums";

    Mock::given(method("COPY"))
        .and(path(format!("{FILES}/Photos/2020/01/a.jpg")))
        .and(header(
            "Destination",
            format!("{}{albums}/Summer%202020/a.jpg", server.uri()).as_str(),
        ))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let response = client
        .copy(
            &format!("{FILES}/Photos/2020/01/a.jpg"),
            &format!("{albums}/Summer 2020/a.jpg"),
        )
        .await
        .expect("copy");
    assert!(response.is_success());
}

#[tokio::test]
async fn test_move_without_overwrite() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("MOVE"))
        .and(path(format!("{FILES}/Photos/2020/01/a.jpg")))
        .and(header("Overwrite", "F"))
        .respond_with(ResponseTemplate::new(412))
        .expect(1)
        .mount(&server)
        .await;

    let response = client
        .move_to(
            &format!("{FILES}/Photos/2020/01/a.jpg"),
            &format!("{FILES}/Photos/2019/12/a.jpg"),
            false,
        )
        .await
        .expect("move");
    assert_eq!(response.status, 412);
}
