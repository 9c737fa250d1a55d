//! Shared test helpers for DAV integration tests
//!
//! Provides a wiremock server plus a DavClient pointing at it, and builders
//! for the multi-status documents Nextcloud returns.

use wiremock::{MockServer, ResponseTemplate};

use gp2nc_dav::DavClient;

pub const USER: &str = "alice";
pub const FILES: &str = "/remote.php/dav/files/alice";

/// Starts a mock server and returns a client authenticated as `alice`
pub async fn setup_dav_mock() -> (MockServer, DavClient) {
    let server = MockServer::start().await;
    let client = DavClient::new(&server.uri(), USER, "secret").expect("client");
    (server, client)
}

/// One `<d:response>` element for a file
pub fn file_response(href: &str, size: u64, md5: Option<&str>, file_id: &str) -> String {
    let checksums = md5
        .map(|sum| format!("<oc:checksums><oc:checksum>SHA1:00 MD5:{sum}</oc:checksum></oc:checksums>"))
        .unwrap_or_default();
    format!(
        r#"<d:response>
  <d:href>{href}</d:href>
  <d:propstat>
    <d:prop>
      <d:getcontentlength>{size}</d:getcontentlength>
      <d:getcontenttype>image/jpeg</d:getcontenttype>
      <d:resourcetype/>
      {checksums}
      <oc:fileid>{file_id}</oc:fileid>
    </d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"#
    )
}

/// One `<d:response>` element for a collection
pub fn collection_response(href: &str) -> String {
    format!(
        r#"<d:response>
  <d:href>{href}</d:href>
  <d:propstat>
    <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"#
    )
}

/// A 207 response wrapping the given `<d:response>` elements
pub fn multistatus(responses: &[String]) -> ResponseTemplate {
    let body = format!(
        r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
{}
</d:multistatus>"#,
        responses.join("\n")
    );
    ResponseTemplate::new(207).set_body_raw(body, "application/xml; charset=utf-8")
}
