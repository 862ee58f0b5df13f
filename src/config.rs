use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{DownloadService, Layout};
use crate::error::WallpaperError;

pub const DEFAULT_CONFIG_FILE: &str = "daily-wallpaper.toml";
pub const DEFAULT_IMAGE_DIR: &str = "Pictures/BingWallpapers";
pub const DEFAULT_REGION: &str = "us";
pub const DEFAULT_BING_MARKET: &str = "en-US";
pub const DEFAULT_BING_URL: &str = "https://www.bing.com/HPImageArchive.aspx";
pub const DEFAULT_PEAPIX_URL: &str = "https://peapix.com/bing/feed";
pub const DEFAULT_IMAGES_TO_KEEP: usize = 84;
pub const JPG_QUALITY_MIN: u8 = 70;
pub const JPG_QUALITY_MAX: u8 = 100;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub image_dir: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub dl_service: Option<DownloadService>,
    #[serde(default)]
    pub number_of_images_to_keep: Option<i64>,
    #[serde(default)]
    pub store_jpg_quality: Option<i64>,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub ftv: FtvSection,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub constant: ConstantSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FtvSection {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DownloadSection {
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub batch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConstantSection {
    #[serde(default)]
    pub bing_url: Option<String>,
    #[serde(default)]
    pub peapix_url: Option<String>,
    #[serde(default)]
    pub alt_peapix_region: Option<Vec<String>>,
    #[serde(default)]
    pub alt_bing_region: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub request_timeout: Duration,
    pub batch_timeout: Duration,
    pub attempts: u32,
    pub workers: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            batch_timeout: Duration::from_secs(10),
            attempts: 3,
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub image_dir: Utf8PathBuf,
    pub region: String,
    pub bing_market: String,
    pub service: DownloadService,
    pub max_images: usize,
    pub jpg_quality: u8,
    pub layout: Layout,
    pub db_path: Utf8PathBuf,
    pub bing_url: String,
    pub peapix_url: String,
    pub countries: Vec<String>,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone)]
pub struct BaseLocations {
    pub home: Utf8PathBuf,
    pub data: Utf8PathBuf,
}

impl BaseLocations {
    pub fn detect() -> Result<Self, WallpaperError> {
        let dirs = BaseDirs::new().ok_or_else(|| {
            WallpaperError::Filesystem("unable to resolve home directory".to_string())
        })?;
        let home = Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf())
            .map_err(|_| WallpaperError::Filesystem("non-utf8 home directory".to_string()))?;
        let data = Utf8PathBuf::from_path_buf(dirs.data_dir().join("daily-wallpaper"))
            .map_err(|_| WallpaperError::Filesystem("non-utf8 data directory".to_string()))?;
        Ok(Self { home, data })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<Settings, WallpaperError> {
        let locations = BaseLocations::detect()?;
        let config = Self::load(path)?;
        Self::resolve_config(config, &locations)
    }

    pub fn load(path: Option<&str>) -> Result<Config, WallpaperError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::info!(
                path = %config_path.display(),
                "no config file found, using defaults"
            );
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| WallpaperError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, WallpaperError> {
        toml::from_str(content).map_err(|err| WallpaperError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        locations: &BaseLocations,
    ) -> Result<Settings, WallpaperError> {
        let image_dir = resolve_under(
            &locations.home,
            config.image_dir.as_deref().unwrap_or(DEFAULT_IMAGE_DIR),
        );
        let db_path = match config.db_path.as_deref() {
            Some(path) => resolve_under(&locations.home, path),
            None => locations.data.join("pages.db"),
        };

        let countries = config
            .constant
            .alt_peapix_region
            .unwrap_or_else(default_countries);
        let markets = config
            .constant
            .alt_bing_region
            .unwrap_or_else(default_bing_markets);
        let region = resolve_region(config.region.as_deref(), &countries);
        let bing_market = resolve_bing_market(&region, &markets);

        let defaults = DownloadSettings::default();
        let attempts = config.download.attempts.unwrap_or(defaults.attempts);
        if attempts == 0 {
            return Err(WallpaperError::InvalidConfig(
                "download.attempts must be at least 1".to_string(),
            ));
        }
        let download = DownloadSettings {
            request_timeout: config
                .download
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            batch_timeout: config
                .download
                .batch_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.batch_timeout),
            attempts,
            workers: config.download.workers.unwrap_or(defaults.workers).max(1),
        };

        Ok(Settings {
            image_dir,
            region,
            bing_market,
            service: config.dl_service.unwrap_or(DownloadService::Peapix),
            max_images: config
                .number_of_images_to_keep
                .map(|value| value.max(0) as usize)
                .unwrap_or(DEFAULT_IMAGES_TO_KEEP),
            jpg_quality: normalize_jpg_quality(
                config
                    .store_jpg_quality
                    .unwrap_or(i64::from(JPG_QUALITY_MIN)),
            ),
            layout: if config.ftv.enabled {
                Layout::DeviceTree
            } else {
                Layout::DateTree
            },
            db_path,
            bing_url: config
                .constant
                .bing_url
                .unwrap_or_else(|| DEFAULT_BING_URL.to_string()),
            peapix_url: config
                .constant
                .peapix_url
                .unwrap_or_else(|| DEFAULT_PEAPIX_URL.to_string()),
            countries,
            download,
        })
    }
}

fn resolve_under(base: &Utf8Path, value: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// Unknown regions fall back to `us`.
pub fn resolve_region(configured: Option<&str>, countries: &[String]) -> String {
    configured
        .map(|value| value.trim().to_lowercase())
        .filter(|value| countries.iter().any(|country| country == value))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

pub fn resolve_bing_market(region: &str, markets: &[String]) -> String {
    let suffix = region.to_uppercase();
    markets
        .iter()
        .find(|market| market.ends_with(&suffix))
        .cloned()
        .unwrap_or_else(|| DEFAULT_BING_MARKET.to_string())
}

pub fn normalize_jpg_quality(value: i64) -> u8 {
    value.clamp(i64::from(JPG_QUALITY_MIN), i64::from(JPG_QUALITY_MAX)) as u8
}

pub fn default_countries() -> Vec<String> {
    [
        "au", "br", "ca", "cn", "de", "fr", "in", "it", "jp", "es", "gb", "us",
    ]
    .iter()
    .map(|value| value.to_string())
    .collect()
}

pub fn default_bing_markets() -> Vec<String> {
    [
        "en-AU", "pt-BR", "en-CA", "zh-CN", "de-DE", "fr-FR", "en-IN", "it-IT", "ja-JP", "es-ES",
        "en-GB", "en-US",
    ]
    .iter()
    .map(|value| value.to_string())
    .collect()
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}
