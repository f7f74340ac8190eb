use super::drive::convert_drive;
use super::{DirEntry, ProgramSource};
use crate::error;
use crate::lang::Error;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_SERVER: &str = "http://localhost:8080/";

/// Fetches programs from a file server that exposes each drive as
/// `<server>/driveX/...`. Directories answer with a JSON listing.
pub struct HttpSource {
    server: String,
    cwd: String,
    client: Client,
}

impl HttpSource {
    pub fn new(server: &str, cwd: &str) -> HttpSource {
        let mut server = server.to_string();
        if !server.ends_with('/') {
            server.push('/');
        }
        HttpSource {
            server,
            cwd: cwd.to_string(),
            client: Client::new(),
        }
    }

    pub fn request_url(&self, path: &str) -> String {
        format!("{}{}", self.server, convert_drive(path, &self.cwd))
    }

    fn get(&self, path: &str) -> Result<reqwest::blocking::Response> {
        let url = self.request_url(path);
        debug!(%url, "http request");
        let response = self.client.get(&url).send().map_err(|e| {
            warn!(%url, error = %e, "http request failed");
            error!(DeviceTimeout; &e.to_string())
        })?;
        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::FORBIDDEN => Err(error!(PermissionDenied)),
            _ => Err(error!(FileNotFound)),
        }
    }
}

impl ProgramSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.get(path)?;
        let bytes = response
            .bytes()
            .map_err(|e| error!(DeviceFault; &e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let response = self.get(path)?;
        response
            .json::<Vec<DirEntry>>()
            .map_err(|_| error!(PathNotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url() {
        let source = HttpSource::new("http://localhost:8080", "C:\\GAMES");
        assert_eq!(
            source.request_url("MENU.BAS"),
            "http://localhost:8080/driveC/GAMES/MENU.BAS"
        );
        assert_eq!(source.request_url(""), "http://localhost:8080/driveC");
        assert_eq!(
            source.request_url("A:\\X.BAS"),
            "http://localhost:8080/driveA/X.BAS"
        );
    }
}
