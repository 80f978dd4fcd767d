//! HTTP transport for the canvas server.

use super::wire::{POLL_FULL_IMAGE_PATH, QUEUE_EVENT_PATH, parse_snapshot};
use super::{RemoteService, SyncError, SyncResult};
use crate::event::EditPayload;
use crate::pixels::PixelStore;
use reqwest::blocking::{Client, Response};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to the canvas server over blocking HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base: Url,
}

impl HttpRemote {
    /// Create a remote for the server at `base`.
    pub fn new(base: Url) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self { client, base: with_trailing_slash(base) })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL of an endpoint.
    pub fn endpoint(&self, path: &str) -> SyncResult<Url> {
        self.base
            .join(path)
            .map_err(|e| SyncError::InvalidUrl(format!("{}{}: {}", self.base, path, e)))
    }
}

/// Make relative joins append to the base path instead of replacing its
/// last segment.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(SyncError::Status { status: status.as_u16(), body })
}

impl RemoteService for HttpRemote {
    fn poll_full_image(&self) -> SyncResult<PixelStore> {
        let url = self.endpoint(POLL_FULL_IMAGE_PATH)?;
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let body = check_status(response)?
            .text()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(parse_snapshot(&body)?)
    }

    fn queue_event(&self, payload: &EditPayload) -> SyncResult<()> {
        let url = self.endpoint(QUEUE_EVENT_PATH)?;
        log::debug!("POST {} ({} cells)", url, payload.cells.len());
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        check_status(response)?;
        Ok(())
    }
}
