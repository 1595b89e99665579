//! Test doubles shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use url::Url;

use crate::http::{FetchResponse, HttpError, UrlConnector};

/// Connector replaying queued responses and recording every call.
///
/// Responses registered per URL take precedence over the shared queue.
#[derive(Default)]
pub struct MockConnector {
    queue: Mutex<VecDeque<Result<FetchResponse, u16>>>,
    by_url: Mutex<HashMap<String, Result<FetchResponse, u16>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_content(&self, body: &[u8], etag: Option<&str>) {
        self.queue.lock().unwrap().push_back(Ok(FetchResponse::Content {
            body: body.to_vec(),
            etag: etag.map(str::to_string),
        }));
    }

    pub fn push_not_modified(&self) {
        self.queue.lock().unwrap().push_back(Ok(FetchResponse::NotModified));
    }

    pub fn push_status(&self, status: u16) {
        self.queue.lock().unwrap().push_back(Err(status));
    }

    /// Always answer `url` with this body.
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.by_url.lock().unwrap().insert(
            url.to_string(),
            Ok(FetchResponse::Content {
                body: body.to_vec(),
                etag: None,
            }),
        );
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl UrlConnector for MockConnector {
    fn fetch(&self, url: &Url, etag: Option<&str>) -> Result<FetchResponse, HttpError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), etag.map(str::to_string)));

        let response = match self.by_url.lock().unwrap().get(url.as_str()) {
            Some(response) => response.clone(),
            None => self.queue.lock().unwrap().pop_front().unwrap_or(Err(404)),
        };

        response.map_err(|status| HttpError::HttpStatus {
            status,
            url: url.to_string(),
        })
    }
}
