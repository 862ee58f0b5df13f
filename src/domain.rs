use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::WallpaperError;

pub const IMAGE_EXT: &str = "jpg";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadService {
    Bing,
    Peapix,
}

impl fmt::Display for DownloadService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadService::Bing => write!(f, "bing"),
            DownloadService::Peapix => write!(f, "peapix"),
        }
    }
}

// DateTree is root/YYYY/MM/file, DeviceTree is root/MM/DD/file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    DateTree,
    DeviceTree,
}

impl Layout {
    pub fn relative_dir(&self, date: NaiveDate) -> Utf8PathBuf {
        match self {
            Layout::DateTree => Utf8PathBuf::from(format!("{:04}", date.year()))
                .join(format!("{:02}", date.month())),
            Layout::DeviceTree => Utf8PathBuf::from(format!("{:02}", date.month()))
                .join(format!("{:02}", date.day())),
        }
    }

    pub fn other(&self) -> Layout {
        match self {
            Layout::DateTree => Layout::DeviceTree,
            Layout::DeviceTree => Layout::DateTree,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::DateTree => write!(f, "date-tree"),
            Layout::DeviceTree => write!(f, "device-tree"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageName {
    date: NaiveDate,
    region: String,
}

impl ImageName {
    pub fn new(date: NaiveDate, region: &str) -> Self {
        Self {
            date,
            region: region.to_string(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        path.file_name().and_then(|name| name.parse().ok())
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}.{IMAGE_EXT}",
            self.date.format(DATE_FORMAT),
            self.region
        )
    }
}

impl FromStr for ImageName {
    type Err = WallpaperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || WallpaperError::InvalidImageName(value.to_string());
        let stem = value
            .strip_suffix(IMAGE_EXT)
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(invalid)?;
        let (date_part, region) = stem.split_once('_').ok_or_else(invalid)?;
        if region.is_empty() || region.contains('_') {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| invalid())?;
        Ok(Self {
            date,
            region: region.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedImage {
    pub date: NaiveDate,
    pub title: String,
    pub copyright: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDownloadData {
    pub date: NaiveDate,
    pub title: String,
    pub copyright: String,
    pub candidate_urls: Vec<String>,
    pub target_directory: Utf8PathBuf,
    pub target_file_name: String,
}

impl ImageDownloadData {
    pub fn target_path(&self) -> Utf8PathBuf {
        self.target_directory.join(&self.target_file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page_id: i64,
    pub country: String,
    pub date: NaiveDate,
    pub page_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub country: String,
    pub date: NaiveDate,
}
