use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::date_resolver::DateResolver;
use crate::domain::{DatedImage, DownloadService};
use crate::error::WallpaperError;
use crate::http::HttpTransport;
use crate::page_store::PageRecordStore;
use crate::providers::MetadataProvider;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeapixRecord {
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub full_url: String,
    #[serde(default)]
    pub thumb_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub copyright: String,
}

impl PeapixRecord {
    // Best quality first.
    pub fn candidate_urls(&self) -> Vec<String> {
        [&self.image_url, &self.full_url, &self.thumb_url]
            .into_iter()
            .filter(|url| !url.is_empty())
            .cloned()
            .collect()
    }
}

pub struct PeapixProvider<T: HttpTransport> {
    transport: T,
    url: String,
    country: String,
    resolver: DateResolver,
    db_path: Utf8PathBuf,
}

impl<T: HttpTransport> PeapixProvider<T> {
    pub fn new(
        transport: T,
        url: String,
        country: String,
        resolver: DateResolver,
        db_path: Utf8PathBuf,
    ) -> Self {
        Self {
            transport,
            url,
            country,
            resolver,
            db_path,
        }
    }

    pub fn fetch_raw(&self) -> Result<Vec<PeapixRecord>, WallpaperError> {
        let body = self
            .transport
            .get(&self.url, &[("country", self.country.as_str())])?;
        let records: Vec<PeapixRecord> = serde_json::from_slice(&body)
            .map_err(|err| WallpaperError::MalformedMetadata(err.to_string()))?;
        debug!(count = records.len(), country = %self.country, "peapix metadata received");
        Ok(records)
    }
}

impl<T: HttpTransport> MetadataProvider for PeapixProvider<T> {
    fn service(&self) -> DownloadService {
        DownloadService::Peapix
    }

    fn fetch_candidates(&self) -> Result<Vec<DatedImage>, WallpaperError> {
        let records = self.fetch_raw()?;
        let mut store = PageRecordStore::open(&self.db_path)?;
        let resolution = self.resolver.resolve(records, &self.country, &mut store)?;
        Ok(resolution
            .records
            .into_iter()
            .map(|item| DatedImage {
                date: item.date,
                urls: item.record.candidate_urls(),
                title: item.record.title,
                copyright: item.record.copyright,
            })
            .collect())
    }
}
