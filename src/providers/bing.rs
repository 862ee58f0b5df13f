use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{DatedImage, DownloadService};
use crate::error::WallpaperError;
use crate::http::HttpTransport;
use crate::providers::MetadataProvider;

pub const IMAGES_TO_REQUEST: u32 = 7;
pub const IMAGE_URL_PREFIX: &str = "http://www.bing.com";
pub const IMAGE_URL_POSTFIX: &str = "_1920x1080.jpg";

#[derive(Debug, Deserialize)]
struct BingResponse {
    #[serde(default)]
    images: Vec<BingImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BingImage {
    #[serde(default)]
    pub startdate: String,
    #[serde(default)]
    pub urlbase: String,
    #[serde(default)]
    pub copyright: String,
}

impl BingImage {
    pub fn to_dated(&self) -> Result<DatedImage, WallpaperError> {
        let date = NaiveDate::parse_from_str(&self.startdate, "%Y%m%d").map_err(|err| {
            WallpaperError::MalformedMetadata(format!("startdate {:?}: {err}", self.startdate))
        })?;
        if self.urlbase.is_empty() {
            return Err(WallpaperError::MalformedMetadata(format!(
                "image for {date} has no urlbase"
            )));
        }
        Ok(DatedImage {
            date,
            title: self.copyright.clone(),
            copyright: self.copyright.clone(),
            urls: vec![format!(
                "{IMAGE_URL_PREFIX}{}{IMAGE_URL_POSTFIX}",
                self.urlbase
            )],
        })
    }
}

pub struct BingProvider<T: HttpTransport> {
    transport: T,
    url: String,
    market: String,
}

impl<T: HttpTransport> BingProvider<T> {
    pub fn new(transport: T, url: String, market: String) -> Self {
        Self {
            transport,
            url,
            market,
        }
    }

    pub fn fetch_raw(&self) -> Result<Vec<BingImage>, WallpaperError> {
        let count = IMAGES_TO_REQUEST.to_string();
        let body = self.transport.get(
            &self.url,
            &[
                ("format", "js"),
                ("idx", "0"),
                ("n", count.as_str()),
                ("mkt", self.market.as_str()),
            ],
        )?;
        let response: BingResponse = serde_json::from_slice(&body)
            .map_err(|err| WallpaperError::MalformedMetadata(err.to_string()))?;
        debug!(count = response.images.len(), market = %self.market, "bing metadata received");
        Ok(response.images)
    }
}

impl<T: HttpTransport> MetadataProvider for BingProvider<T> {
    fn service(&self) -> DownloadService {
        DownloadService::Bing
    }

    fn fetch_candidates(&self) -> Result<Vec<DatedImage>, WallpaperError> {
        let images = self.fetch_raw()?;
        let mut candidates = Vec::with_capacity(images.len());
        for image in &images {
            match image.to_dated() {
                Ok(dated) => candidates.push(dated),
                Err(err) => warn!(error = %err, "skipping bing record"),
            }
        }
        Ok(candidates)
    }
}
