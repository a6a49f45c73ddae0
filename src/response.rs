//! Response construction with write tracking.
//!
//! The tracker buffers the response under construction and records whether
//! any output has been produced. The renderer checks the flag before doing
//! anything, which is what makes post-handler rendering safe to run
//! unconditionally.

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;

pub struct ResponseTracker {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    wrote: bool,
}

impl ResponseTracker {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            wrote: false,
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set the response status. Counts as output: rendering will not run
    /// afterward.
    pub fn write_status(&mut self, status: StatusCode) {
        self.wrote = true;
        self.status = status;
    }

    /// Append body bytes.
    pub fn write(&mut self, bytes: &[u8]) {
        self.wrote = true;
        self.body.extend_from_slice(bytes);
    }

    /// True once any output was produced. Never reverts to false.
    pub fn written(&self) -> bool {
        self.wrote
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl IntoResponse for ResponseTracker {
    fn into_response(self) -> axum::response::Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn starts_unwritten() {
        let tracker = ResponseTracker::new();
        assert!(!tracker.written());
        assert_eq!(tracker.status(), StatusCode::OK);
    }

    #[test]
    fn write_sets_flag_permanently() {
        let mut tracker = ResponseTracker::new();
        tracker.write(b"hello");
        assert!(tracker.written());
        tracker.write(b" world");
        assert!(tracker.written());
        assert_eq!(tracker.body(), b"hello world");
    }

    #[test]
    fn status_write_counts_as_output() {
        let mut tracker = ResponseTracker::new();
        tracker.write_status(StatusCode::NOT_FOUND);
        assert!(tracker.written());
    }

    #[test]
    fn converts_into_response() {
        let mut tracker = ResponseTracker::new();
        tracker
            .headers_mut()
            .insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        tracker.write_status(StatusCode::IM_A_TEAPOT);
        tracker.write(b"short and stout");

        let response = tracker.into_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }
}
