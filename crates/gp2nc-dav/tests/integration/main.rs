//! Integration tests for gp2nc-dav
//!
//! Uses wiremock to simulate a Nextcloud DAV endpoint and verifies the
//! requests DavClient sends and how it reports the answers.

mod common;

mod test_collections;
mod test_transfers;
