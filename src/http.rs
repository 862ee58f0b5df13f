use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::WallpaperError;

pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, WallpaperError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, WallpaperError> {
        (**self).get(url, query)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, WallpaperError> {
        (**self).get(url, query)
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, WallpaperError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("daily-wallpaper/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| WallpaperError::RemoteService(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| WallpaperError::RemoteService(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(response: Response) -> Result<Response, WallpaperError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(WallpaperError::RemoteStatus {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, WallpaperError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|err| WallpaperError::RemoteService(format!("{url}: {err}")))?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| WallpaperError::RemoteService(format!("{url}: {err}")))?;
        Ok(bytes.to_vec())
    }
}
