//! Version poller: asks the server which payload version is current.
//!
//! Every failure degrades to `None` ("no version signal this tick").
use serde::Deserialize;

use crate::config::Endpoints;
use crate::transport::HttpTransport;

#[derive(Deserialize)]
struct VersionInfo {
    #[serde(default)]
    version: u64,
}

/// `GET {server}/api/latestVersion` -> `{"version": n}`. A missing field reads as 0.
pub fn check_version<T: HttpTransport + ?Sized>(transport: &mut T, endpoints: &Endpoints) -> Option<u64> {
    let response = match transport.get(&endpoints.version_url) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Error checking version: {}", e);
            return None;
        }
    };

    if !response.is_ok() {
        log::warn!("Version check failed: HTTP {}", response.status);
        return None;
    }

    match serde_json::from_slice::<VersionInfo>(&response.body) {
        Ok(info) => {
            log::debug!("Server reports version {}", info.version);
            Some(info.version)
        }
        Err(e) => {
            log::warn!("Malformed version response: {}", e);
            None
        }
    }
}
