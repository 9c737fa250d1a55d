//! Integration tests for probing, listing and creating collections

use gp2nc_core::ports::{IRemoteStore, RemoteError};
use wiremock::matchers::{basic_auth, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, FILES};

#[tokio::test]
async fn test_probe_reports_size_and_file_id() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("HEAD"))
        .and(path(format!("{FILES}/Photos/2020/01/a.jpg")))
        .and(basic_auth(common::USER, "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Length", "1234")
                .insert_header("OC-FileId", "00000042ocabc"),
        )
        .mount(&server)
        .await;

    let response = client
        .probe(&format!("{FILES}/Photos/2020/01/a.jpg"))
        .await
        .expect("probe");
    let probe = response.probe_result();

    assert!(probe.exists);
    assert_eq!(probe.size, Some(1234));
    assert_eq!(probe.file_id.as_deref(), Some("00000042ocabc"));
}

#[tokio::test]
async fn test_probe_missing_entry() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = client.probe(&format!("{FILES}/nope")).await.expect("probe");
    assert!(!response.probe_result().exists);
}

#[tokio::test]
async fn test_list_drops_self_entry_and_decodes_paths() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("PROPFIND"))
        .and(path(format!("{FILES}/Photos")))
        .and(header("Depth", "1"))
        .respond_with(common::multistatus(&[
            common::collection_response(&format!("{FILES}/Photos/")),
            common::collection_response(&format!("{FILES}/Photos/2020/")),
            common::file_response(
                &format!("{FILES}/Photos/my%20photo.jpg"),
                2048,
                Some("D41D8CD98F00B204E9800998ECF8427E"),
                "77",
            ),
        ]))
        .mount(&server)
        .await;

    let entries = client.list(&format!("{FILES}/Photos"), 1).await.expect("list");
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].path, format!("{FILES}/Photos/2020"));
    assert!(entries[0].is_collection);
    assert_eq!(entries[0].display_name, "2020");

    let file = &entries[1];
    assert_eq!(file.path, format!("{FILES}/Photos/my photo.jpg"));
    assert_eq!(file.display_name, "my photo.jpg");
    assert_eq!(file.size, Some(2048));
    assert_eq!(file.file_id.as_deref(), Some("77"));
    assert_eq!(
        file.md5_checksum().as_deref(),
        Some("d41d8cd98f00b204e9800998ecf8427e")
    );
}

#[tokio::test]
async fn test_list_non_multistatus_is_an_error() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client.list(&format!("{FILES}/Missing"), 1).await;
    match result {
        Err(RemoteError::UnexpectedStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_garbage_body_is_invalid_response() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(207).set_body_string("<d:multistatus><d:response></d:multistatus>"))
        .mount(&server)
        .await;

    let result = client.list(&format!("{FILES}/Photos"), 1).await;
    assert!(matches!(result, Err(RemoteError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_create_collection_returns_status() {
    let (server, client) = common::setup_dav_mock().await;

    Mock::given(method("MKCOL"))
        .and(path(format!("{FILES}/Photos/2021")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path(format!("{FILES}/Photos/2020")))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let created = client
        .create_collection(&format!("{FILES}/Photos/2021"))
        .await
        .expect("mkcol");
    assert_eq!(created.status, 201);

    let existing = client
        .create_collection(&format!("{FILES}/Photos/2020"))
        .await
        .expect("mkcol");
    assert_eq!(existing.status, 405);
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let (server, client) = common::setup_dav_mock().await;
    drop(server);

    let err = client.probe(&format!("{FILES}/a.jpg")).await.unwrap_err();
    assert!(err.is_transient(), "expected transport error, got {err:?}");
}
