pub mod bing;
pub mod peapix;

use std::sync::Arc;

use crate::config::Settings;
use crate::date_resolver::DateResolver;
use crate::domain::{DatedImage, DownloadService};
use crate::error::WallpaperError;
use crate::http::HttpTransport;

pub use bing::BingProvider;
pub use peapix::PeapixProvider;

pub trait MetadataProvider {
    fn service(&self) -> DownloadService;
    fn fetch_candidates(&self) -> Result<Vec<DatedImage>, WallpaperError>;
}

pub fn build_provider(
    settings: &Settings,
    transport: Arc<dyn HttpTransport>,
) -> Box<dyn MetadataProvider> {
    match settings.service {
        DownloadService::Bing => Box::new(BingProvider::new(
            transport,
            settings.bing_url.clone(),
            settings.bing_market.clone(),
        )),
        DownloadService::Peapix => Box::new(PeapixProvider::new(
            transport,
            settings.peapix_url.clone(),
            settings.region.clone(),
            DateResolver::new(settings.countries.clone()),
            settings.db_path.clone(),
        )),
    }
}
