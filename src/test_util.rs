//! Shared helpers for the in-crate test suites.

use http::request::Parts;

/// A minimal set of request parts standing in for an upgraded request.
pub(crate) fn test_parts() -> Parts {
    let (parts, ()) = http::Request::builder()
        .uri("/ws")
        .body(())
        .expect("request")
        .into_parts();
    parts
}
